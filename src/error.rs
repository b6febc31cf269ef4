//! Error types for crypto-cli

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for crypto-cli
#[derive(Error, Debug)]
pub enum Error {
    // Scheme errors
    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid key length for {scheme}: expected {expected} bytes, got {got} bytes")]
    InvalidKeyLength {
        scheme: String,
        expected: usize,
        got: usize,
    },

    // Cipher errors
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Authentication failed - data corrupted or wrong key")]
    AuthenticationFailure,

    #[error("Invalid padding: {0}")]
    InvalidPadding(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Secure random source failed: {0}")]
    Random(String),

    // Integrity errors
    #[error("Checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Soft errors are reported but never abort an operation
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::ChecksumMismatch { .. })
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_checksum_mismatch_is_soft() {
        let mismatch = Error::ChecksumMismatch {
            path: PathBuf::from("a.txt"),
            expected: "00".to_string(),
            actual: "11".to_string(),
        };
        assert!(mismatch.is_soft());
        assert!(!Error::AuthenticationFailure.is_soft());
        assert!(!Error::InvalidPadding("bad".to_string()).is_soft());
    }

    #[test]
    fn test_key_length_message() {
        let err = Error::InvalidKeyLength {
            scheme: "chacha".to_string(),
            expected: 32,
            got: 16,
        };
        assert_eq!(
            err.to_string(),
            "Invalid key length for chacha: expected 32 bytes, got 16 bytes"
        );
    }
}
