//! Metadata sidecars (`<path>.meta.yaml`)

use super::with_suffix;
use crate::crypto::{encode_salt, SecretKey};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Non-secret facts about how a file was encrypted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub original_filename: String,
    pub scheme: String,
    /// `raw` or `pbkdf2-sha256`
    pub key_derivation: String,
    /// Hex salt, present for password-derived keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Metadata {
    /// Describe an encryption of `path` under `scheme` and `key`
    pub fn new(path: &Path, scheme: &str, key: &SecretKey) -> Self {
        let original_filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        Metadata {
            original_filename,
            scheme: scheme.to_string(),
            key_derivation: key.derivation_label().to_string(),
            salt: key.salt().map(encode_salt),
            timestamp: Utc::now(),
        }
    }
}

/// Sidecar location for `path`
pub fn metadata_path(path: &Path) -> PathBuf {
    with_suffix(path, ".meta.yaml")
}

pub fn write_metadata(path: &Path, meta: &Metadata) -> Result<()> {
    let yaml = serde_yaml::to_string(meta)?;
    fs::write(metadata_path(path), yaml)?;
    Ok(())
}

/// Read the sidecar for `path`; `None` when there is none
pub fn read_metadata(path: &Path) -> Result<Option<Metadata>> {
    let content = match fs::read_to_string(metadata_path(path)) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_yaml::from_str(&content)?))
}
