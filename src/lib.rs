//! crypto-cli - Pluggable symmetric encryption for strings and files
//!
//! This library provides a registry of cipher schemes (AES-CBC, AES-GCM and
//! ChaCha20-Poly1305), password-based key derivation, a streaming CBC
//! pipeline for large files, and a batch runner that can process many files
//! concurrently.

pub mod batch;
pub mod config;
pub mod crypto;
pub mod error;
pub mod integrity;
pub mod stream;

pub use config::Config;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batch::{BatchOptions, BatchRunner, FileMode, Operation};
    pub use crate::config::Config;
    pub use crate::crypto::{CipherScheme, SchemeRegistry, SecretKey};
    pub use crate::error::{Error, Result};
}
