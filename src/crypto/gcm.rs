//! AES-128-GCM scheme
//!
//! Envelope: hex( nonce[12] || ciphertext || tag[16] )

use crate::crypto::aead;
use crate::crypto::{CipherScheme, OsRandom, RandomSource, SCHEME_GCM};
use crate::error::{Error, Result};
use ring::aead::AES_128_GCM;
use std::sync::Arc;

/// AES-128-GCM with hex-encoded envelopes
#[derive(Clone)]
pub struct GcmScheme {
    random: Arc<dyn RandomSource>,
}

impl GcmScheme {
    pub fn new() -> Self {
        Self::with_random(Arc::new(OsRandom))
    }

    /// Use a specific nonce source
    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        GcmScheme { random }
    }
}

impl Default for GcmScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl CipherScheme for GcmScheme {
    fn name(&self) -> &'static str {
        SCHEME_GCM
    }

    fn key_len(&self) -> usize {
        16
    }

    fn is_authenticated(&self) -> bool {
        true
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<String> {
        self.check_key(key)?;
        let envelope = aead::seal(&AES_128_GCM, key, self.random.as_ref(), plaintext)?;
        Ok(hex::encode(envelope))
    }

    fn decrypt(&self, envelope: &str, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key(key)?;
        let raw = hex::decode(envelope.trim())
            .map_err(|e| Error::MalformedEnvelope(format!("invalid hex: {}", e)))?;
        aead::open(&AES_128_GCM, key, &raw)
    }
}
