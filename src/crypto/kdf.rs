//! Password-based key derivation (PBKDF2-HMAC-SHA256)

use crate::crypto::{OsRandom, RandomSource, PBKDF2_ITERATIONS, SALT_SIZE};
use crate::error::{Error, Result};
use ring::pbkdf2;
use std::num::NonZeroU32;
use tracing::debug;
use zeroize::Zeroizing;

/// Required key length for every built-in scheme
pub const SCHEME_KEY_LENGTHS: &[(&str, usize)] = &[("cbc", 16), ("gcm", 16), ("chacha", 32)];

/// Look up the key length a scheme requires
pub fn required_key_length(scheme: &str) -> Result<usize> {
    SCHEME_KEY_LENGTHS
        .iter()
        .find(|(name, _)| *name == scheme)
        .map(|(_, len)| *len)
        .ok_or_else(|| Error::UnsupportedScheme(scheme.to_string()))
}

/// Derive a key for `scheme` from a password and salt.
///
/// Output length matches the scheme's required key length, so the same
/// (password, salt, scheme) always yields the same key.
pub fn derive_key(password: &[u8], salt: &[u8], scheme: &str) -> Result<Zeroizing<Vec<u8>>> {
    let len = required_key_length(scheme)?;
    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| Error::KeyDerivation("iteration count must be non-zero".to_string()))?;

    let mut key = Zeroizing::new(vec![0u8; len]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password,
        key.as_mut_slice(),
    );

    debug!("Derived {}-byte key for scheme {}", len, scheme);
    Ok(key)
}

/// Generate a fresh salt from the OS random source
pub fn generate_salt() -> Result<[u8; SALT_SIZE]> {
    generate_salt_with(&OsRandom)
}

/// Generate a fresh salt from the given random source
pub fn generate_salt_with(random: &dyn RandomSource) -> Result<[u8; SALT_SIZE]> {
    let mut salt = [0u8; SALT_SIZE];
    random.fill(&mut salt)?;
    Ok(salt)
}

/// Hex-encode a salt for display and storage
pub fn encode_salt(salt: &[u8]) -> String {
    hex::encode(salt)
}

/// Decode a hex salt entered by the user
pub fn decode_salt(salt_hex: &str) -> Result<Vec<u8>> {
    let trimmed = salt_hex.trim();
    if trimmed.is_empty() {
        return Err(Error::KeyDerivation("salt is empty".to_string()));
    }
    hex::decode(trimmed).map_err(|e| Error::KeyDerivation(format!("invalid salt hex: {}", e)))
}

/// Reject keys whose length differs from what `scheme` requires
pub fn validate_key_length(key: &[u8], scheme: &str) -> Result<()> {
    let expected = required_key_length(scheme)?;
    if key.len() != expected {
        return Err(Error::InvalidKeyLength {
            scheme: scheme.to_string(),
            expected,
            got: key.len(),
        });
    }
    Ok(())
}
