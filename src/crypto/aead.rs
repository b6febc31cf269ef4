//! Shared AEAD seal/open over ring
//!
//! Both AEAD schemes lay out their envelope as `nonce || ciphertext || tag`;
//! they differ only in algorithm and text encoding.

use crate::crypto::{RandomSource, NONCE_SIZE, TAG_SIZE};
use crate::error::{Error, Result};
use ring::aead::{Aad, Algorithm, LessSafeKey, Nonce, UnboundKey};

/// Seal `plaintext` under a fresh random nonce, returning `nonce || ct || tag`
pub(crate) fn seal(
    algorithm: &'static Algorithm,
    key: &[u8],
    random: &dyn RandomSource,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let unbound_key = UnboundKey::new(algorithm, key)
        .map_err(|_| Error::Encryption("Failed to create encryption key".to_string()))?;
    let sealing_key = LessSafeKey::new(unbound_key);

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    random.fill(&mut nonce_bytes)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let mut in_out = Vec::with_capacity(plaintext.len() + TAG_SIZE);
    in_out.extend_from_slice(plaintext);
    sealing_key
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| Error::Encryption("Encryption failed".to_string()))?;

    let mut envelope = Vec::with_capacity(NONCE_SIZE + in_out.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&in_out);
    Ok(envelope)
}

/// Open a `nonce || ct || tag` envelope; fails closed on any tag mismatch
pub(crate) fn open(algorithm: &'static Algorithm, key: &[u8], envelope: &[u8]) -> Result<Vec<u8>> {
    if envelope.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Error::MalformedEnvelope(format!(
            "envelope is {} bytes, need at least {}",
            envelope.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let unbound_key = UnboundKey::new(algorithm, key)
        .map_err(|_| Error::Encryption("Failed to create decryption key".to_string()))?;
    let opening_key = LessSafeKey::new(unbound_key);

    let (nonce_bytes, sealed) = envelope.split_at(NONCE_SIZE);
    let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| Error::MalformedEnvelope("bad nonce".to_string()))?;

    let mut in_out = sealed.to_vec();
    let plaintext = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| Error::AuthenticationFailure)?;

    Ok(plaintext.to_vec())
}
