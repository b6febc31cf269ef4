//! Secure random byte source used for salts, IVs and nonces

use crate::error::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;

/// Source of random bytes for salts, IVs and nonces.
///
/// Schemes hold one behind an `Arc` so tests can substitute a deterministic
/// source; production code uses [`OsRandom`].
pub trait RandomSource: Send + Sync {
    /// Fill `dest` entirely with random bytes
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

/// Operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        OsRng
            .try_fill_bytes(dest)
            .map_err(|e| Error::Random(e.to_string()))
    }
}
