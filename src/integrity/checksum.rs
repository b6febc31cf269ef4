//! SHA-256 checksum sidecars (`<path>.sha256`)

use super::with_suffix;
use crate::error::{Error, Result};
use ring::digest::{digest, SHA256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Hex SHA-256 of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest(&SHA256, data))
}

/// Sidecar location for `path`
pub fn checksum_path(path: &Path) -> PathBuf {
    with_suffix(path, ".sha256")
}

/// Write the hex digest, with no trailing metadata
pub fn write_checksum(path: &Path, checksum: &str) -> Result<()> {
    fs::write(checksum_path(path), checksum)?;
    Ok(())
}

/// Read the sidecar for `path`; `None` when there is none
pub fn read_checksum(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(checksum_path(path)) {
        Ok(content) => Ok(Some(content.trim().to_lowercase())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Outcome of comparing a fresh digest against a sidecar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumStatus {
    Match,
    Mismatch { expected: String, actual: String },
    Missing,
}

impl ChecksumStatus {
    /// The soft error to report for a mismatch
    pub fn to_error(&self, path: &Path) -> Option<Error> {
        match self {
            ChecksumStatus::Mismatch { expected, actual } => Some(Error::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: expected.clone(),
                actual: actual.clone(),
            }),
            _ => None,
        }
    }
}

/// Compare `actual` (hex) against the sidecar stored for `path`
pub fn verify_checksum(path: &Path, actual: &str) -> Result<ChecksumStatus> {
    let status = match read_checksum(path)? {
        None => ChecksumStatus::Missing,
        Some(expected) if expected == actual.to_lowercase() => ChecksumStatus::Match,
        Some(expected) => ChecksumStatus::Mismatch {
            expected,
            actual: actual.to_string(),
        },
    };
    Ok(status)
}
