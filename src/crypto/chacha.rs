//! ChaCha20-Poly1305 scheme
//!
//! Envelope: base64( nonce[12] || ciphertext || tag[16] ), 32-byte key.

use crate::crypto::aead;
use crate::crypto::{CipherScheme, OsRandom, RandomSource, SCHEME_CHACHA};
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::aead::CHACHA20_POLY1305;
use std::sync::Arc;

#[derive(Clone)]
pub struct ChaChaScheme {
    random: Arc<dyn RandomSource>,
}

impl ChaChaScheme {
    pub fn new() -> Self {
        Self::with_random(Arc::new(OsRandom))
    }

    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        ChaChaScheme { random }
    }
}

impl Default for ChaChaScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl CipherScheme for ChaChaScheme {
    fn name(&self) -> &'static str {
        SCHEME_CHACHA
    }

    fn key_len(&self) -> usize {
        32
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<String> {
        self.check_key(key)?;
        let envelope = aead::seal(&CHACHA20_POLY1305, key, self.random.as_ref(), plaintext)?;
        Ok(STANDARD.encode(envelope))
    }

    fn decrypt(&self, envelope: &str, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key(key)?;
        let raw = STANDARD
            .decode(envelope.trim())
            .map_err(|e| Error::MalformedEnvelope(format!("invalid base64: {}", e)))?;
        aead::open(&CHACHA20_POLY1305, key, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{NONCE_SIZE, TAG_SIZE};
    use proptest::prelude::*;

    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_encrypt_decrypt() {
        let scheme = ChaChaScheme::new();
        let envelope = scheme.encrypt(b"Secret data", KEY).unwrap();
        assert_eq!(scheme.decrypt(&envelope, KEY).unwrap(), b"Secret data");
    }

    #[test]
    fn test_envelope_is_base64_with_nonce_and_tag() {
        let scheme = ChaChaScheme::new();
        let envelope = scheme.encrypt(b"abc", KEY).unwrap();
        let raw = STANDARD.decode(envelope).unwrap();
        assert_eq!(raw.len(), NONCE_SIZE + 3 + TAG_SIZE);
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let scheme = ChaChaScheme::new();
        let a = scheme.encrypt(b"same", KEY).unwrap();
        let b = scheme.encrypt(b"same", KEY).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_requires_32_byte_key() {
        let scheme = ChaChaScheme::new();
        assert!(matches!(
            scheme.encrypt(b"x", b"1234567890abcdef"),
            Err(Error::InvalidKeyLength { expected: 32, got: 16, .. })
        ));
        assert!(matches!(
            scheme.decrypt("AAAA", b"short"),
            Err(Error::InvalidKeyLength { .. })
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let scheme = ChaChaScheme::new();
        let mut raw = STANDARD
            .decode(scheme.encrypt(b"Secret data", KEY).unwrap())
            .unwrap();
        raw[NONCE_SIZE] ^= 0xFF;
        let result = scheme.decrypt(&STANDARD.encode(raw), KEY);
        assert!(matches!(result, Err(Error::AuthenticationFailure)));
    }

    #[test]
    fn test_short_envelope() {
        let scheme = ChaChaScheme::new();
        let short = STANDARD.encode([0u8; NONCE_SIZE]);
        assert!(matches!(
            scheme.decrypt(&short, KEY),
            Err(Error::MalformedEnvelope(_))
        ));
        assert!(matches!(
            scheme.decrypt("!!!", KEY),
            Err(Error::MalformedEnvelope(_))
        ));
    }

    proptest! {
        #[test]
        fn round_trip(data in proptest::collection::vec(any::<u8>(), 0..=2048)) {
            let scheme = ChaChaScheme::new();
            let envelope = scheme.encrypt(&data, KEY).unwrap();
            prop_assert_eq!(scheme.decrypt(&envelope, KEY).unwrap(), data);
        }

        #[test]
        fn any_bit_flip_is_rejected(
            data in proptest::collection::vec(any::<u8>(), 0..=256),
            pos in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let scheme = ChaChaScheme::new();
            let mut raw = STANDARD.decode(scheme.encrypt(&data, KEY).unwrap()).unwrap();
            let idx = NONCE_SIZE + pos.index(raw.len() - NONCE_SIZE);
            raw[idx] ^= 1 << bit;
            let result = scheme.decrypt(&STANDARD.encode(raw), KEY);
            prop_assert!(matches!(result, Err(Error::AuthenticationFailure)));
        }
    }
}
