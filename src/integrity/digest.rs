//! Digest utility behind the `hash` command

use crate::error::{Error, Result};
use ring::digest::{Algorithm, Context, SHA256, SHA384, SHA512};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    fn ring_algorithm(self) -> &'static Algorithm {
        match self {
            DigestAlgorithm::Sha256 => &SHA256,
            DigestAlgorithm::Sha384 => &SHA384,
            DigestAlgorithm::Sha512 => &SHA512,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha384" => Ok(DigestAlgorithm::Sha384),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            other => Err(Error::Config(format!(
                "unsupported digest algorithm '{}': choose sha256, sha384 or sha512",
                other
            ))),
        }
    }
}

/// Hex digest of an in-memory buffer
pub fn hash_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    hex::encode(ring::digest::digest(algorithm.ring_algorithm(), data))
}

/// Hex digest of everything `reader` yields
pub fn hash_reader<R: Read>(algorithm: DigestAlgorithm, mut reader: R) -> Result<String> {
    let mut context = Context::new(algorithm.ring_algorithm());
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => context.update(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(hex::encode(context.finish()))
}

/// Hex digest of a file, read in a streaming fashion
pub fn hash_file(algorithm: DigestAlgorithm, path: &Path) -> Result<String> {
    hash_reader(algorithm, BufReader::new(File::open(path)?))
}
