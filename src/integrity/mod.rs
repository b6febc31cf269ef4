//! Integrity helpers: checksum and metadata sidecars, digests
//!
//! Sidecar checks are best-effort corruption detection. They are separate
//! from, and weaker than, the authentication AEAD schemes provide.

mod checksum;
mod digest;
mod metadata;

pub use checksum::{
    checksum_path, read_checksum, sha256_hex, verify_checksum, write_checksum, ChecksumStatus,
};
pub use digest::{hash_bytes, hash_file, hash_reader, DigestAlgorithm};
pub use metadata::{metadata_path, read_metadata, write_metadata, Metadata};

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// `path` with `suffix` appended to its final component
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
