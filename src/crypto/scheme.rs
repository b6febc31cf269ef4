//! Uniform capability contract every cipher scheme implements

use crate::error::{Error, Result};

/// A symmetric scheme that produces and consumes text envelopes.
///
/// The envelope layout (IV/nonce placement, tag placement, text encoding) is
/// scheme specific and part of the on-wire format.
pub trait CipherScheme: Send + Sync {
    /// Registry name, e.g. `"cbc"`
    fn name(&self) -> &'static str;

    /// Exact key length this scheme accepts
    fn key_len(&self) -> usize;

    /// Whether the envelope carries an authentication tag
    fn is_authenticated(&self) -> bool;

    /// Encrypt `plaintext` under `key` into a text envelope
    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<String>;

    /// Decrypt a text envelope produced by [`CipherScheme::encrypt`]
    fn decrypt(&self, envelope: &str, key: &[u8]) -> Result<Vec<u8>>;

    /// Reject wrong-length keys before any primitive sees them
    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.key_len() {
            return Err(Error::InvalidKeyLength {
                scheme: self.name().to_string(),
                expected: self.key_len(),
                got: key.len(),
            });
        }
        Ok(())
    }
}
