//! AES-128-CBC scheme
//!
//! Envelope: base64( IV[16] || CBC(PKCS7(plaintext)) ).
//!
//! CBC provides confidentiality only. A modified envelope decrypts to garbage
//! unless the padding check happens to catch it; integrity for CBC data comes
//! from the external checksum sidecar, which detects corruption or a wrong key
//! but not an adversary who can also rewrite the sidecar.
//!
//! Reusing one raw (non-derived) key across many files is accepted without
//! warning. Under CBC that is a known weakness: nothing binds a ciphertext to
//! its file, so blocks can be swapped between files encrypted under that key.

use crate::crypto::{
    pkcs7_pad, pkcs7_unpad, validate_key_length, CipherScheme, OsRandom, RandomSource,
    BLOCK_SIZE, SCHEME_CBC,
};
use crate::error::{Error, Result};
use aes::Aes128;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use std::sync::Arc;

/// Chained CBC encryptor; state carries across calls so a stream can be
/// encrypted chunk by chunk
pub struct CbcEncryptor {
    inner: cbc::Encryptor<Aes128>,
}

impl CbcEncryptor {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        validate_key_length(key, SCHEME_CBC)?;
        let inner = cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| Error::Encryption(format!("IV must be {} bytes", BLOCK_SIZE)))?;
        Ok(CbcEncryptor { inner })
    }

    /// Encrypt whole blocks in place
    pub fn encrypt_blocks(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() % BLOCK_SIZE != 0 {
            return Err(Error::Encryption(format!(
                "{} bytes is not a multiple of the block size",
                buf.len()
            )));
        }
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            self.inner
                .encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
}

/// Chained CBC decryptor
pub struct CbcDecryptor {
    inner: cbc::Decryptor<Aes128>,
}

impl CbcDecryptor {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        validate_key_length(key, SCHEME_CBC)?;
        let inner = cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| Error::MalformedEnvelope(format!("IV must be {} bytes", BLOCK_SIZE)))?;
        Ok(CbcDecryptor { inner })
    }

    /// Decrypt whole blocks in place
    pub fn decrypt_blocks(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() % BLOCK_SIZE != 0 {
            return Err(Error::MalformedEnvelope(format!(
                "{} bytes is not a multiple of the block size",
                buf.len()
            )));
        }
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            self.inner
                .decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
}

/// AES-128-CBC with PKCS#7 padding and base64 envelopes
#[derive(Clone)]
pub struct CbcScheme {
    random: Arc<dyn RandomSource>,
}

impl CbcScheme {
    pub fn new() -> Self {
        Self::with_random(Arc::new(OsRandom))
    }

    /// Use a specific IV source
    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        CbcScheme { random }
    }
}

impl Default for CbcScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl CipherScheme for CbcScheme {
    fn name(&self) -> &'static str {
        SCHEME_CBC
    }

    fn key_len(&self) -> usize {
        16
    }

    fn is_authenticated(&self) -> bool {
        false
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<String> {
        self.check_key(key)?;

        let mut iv = [0u8; BLOCK_SIZE];
        self.random.fill(&mut iv)?;

        let mut body = pkcs7_pad(plaintext, BLOCK_SIZE)?;
        CbcEncryptor::new(key, &iv)?.encrypt_blocks(&mut body)?;

        let mut envelope = Vec::with_capacity(BLOCK_SIZE + body.len());
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(&body);
        Ok(STANDARD.encode(envelope))
    }

    fn decrypt(&self, envelope: &str, key: &[u8]) -> Result<Vec<u8>> {
        self.check_key(key)?;

        let raw = STANDARD
            .decode(envelope.trim())
            .map_err(|e| Error::MalformedEnvelope(format!("invalid base64: {}", e)))?;

        // IV plus at least one padded block
        if raw.len() < 2 * BLOCK_SIZE || raw.len() % BLOCK_SIZE != 0 {
            return Err(Error::MalformedEnvelope(format!(
                "ciphertext length {} is invalid",
                raw.len()
            )));
        }

        let (iv, body) = raw.split_at(BLOCK_SIZE);
        let mut body = body.to_vec();
        CbcDecryptor::new(key, iv)?.decrypt_blocks(&mut body)?;

        let plaintext = pkcs7_unpad(&body, BLOCK_SIZE)?;
        Ok(plaintext.to_vec())
    }
}
