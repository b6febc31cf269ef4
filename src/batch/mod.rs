//! Batch processing of strings and files
//!
//! A [`BatchRunner`] applies one scheme and one key to many inputs, either one
//! after another or with one blocking worker per file. A failure on one input
//! is reported for that input only.

mod progress;
mod runner;

pub use progress::ProgressFn;
pub use runner::BatchRunner;

use crate::error::{Error, Result};
use crate::integrity::ChecksumStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Direction of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Encrypt,
    Decrypt,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
        }
    }

    /// Suffix appended to an input path when no output is given
    pub fn output_suffix(self) -> &'static str {
        match self {
            Operation::Encrypt => ".enc",
            Operation::Decrypt => ".dec",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "encrypt" => Ok(Operation::Encrypt),
            "decrypt" => Ok(Operation::Decrypt),
            other => Err(Error::InvalidConfig(format!(
                "mode must be encrypt or decrypt, got '{}'",
                other
            ))),
        }
    }
}

/// How file contents pass through the cipher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileMode {
    /// Whole file in memory, text envelope out (any scheme)
    #[default]
    Buffered,
    /// Chunked raw CBC stream (cbc only)
    Streamed,
}

/// Knobs for file batches
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub file_mode: FileMode,
    /// Write `.sha256` sidecars on encrypt and check them on decrypt
    pub checksums: bool,
    /// Write `.meta.yaml` sidecars on encrypt
    pub metadata: bool,
    /// Explicit output file (single input) or directory
    pub output: Option<PathBuf>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            file_mode: FileMode::Buffered,
            checksums: true,
            metadata: false,
            output: None,
        }
    }
}

/// Result of one successfully processed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub bytes_written: u64,
    /// Hex SHA-256 of the plaintext side
    pub plaintext_sha256: String,
    /// Sidecar comparison, decrypt only
    pub checksum: Option<ChecksumStatus>,
}

/// Per-input outcome of a file batch
#[derive(Debug)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub result: Result<FileReport>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary counts over a batch
pub fn count_failures(outcomes: &[FileOutcome]) -> usize {
    outcomes.iter().filter(|o| !o.is_ok()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse() {
        assert_eq!("encrypt".parse::<Operation>().unwrap(), Operation::Encrypt);
        assert_eq!(" Decrypt ".parse::<Operation>().unwrap(), Operation::Decrypt);
        assert!("shred".parse::<Operation>().is_err());
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(Operation::Encrypt.output_suffix(), ".enc");
        assert_eq!(Operation::Decrypt.output_suffix(), ".dec");
    }

    #[test]
    fn test_default_options() {
        let options = BatchOptions::default();
        assert_eq!(options.file_mode, FileMode::Buffered);
        assert!(options.checksums);
        assert!(!options.metadata);
        assert!(options.output.is_none());
    }
}
