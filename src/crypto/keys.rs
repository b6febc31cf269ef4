//! Key material for crypto-cli
//!
//! A key is either supplied directly by the caller or derived from a password:
//! - Raw: bytes taken as-is (e.g. `--key 1234567890abcdef`)
//! - Derived: PBKDF2 output; the salt travels with the key so it can be
//!   reported to the user and recorded in metadata sidecars

use crate::crypto::{derive_key, generate_salt_with, validate_key_length, RandomSource};
use crate::error::Result;
use std::fmt;
use zeroize::Zeroizing;

/// How a key was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Supplied directly by the caller
    Raw,
    /// Derived from a password with this salt
    Derived { salt: Vec<u8> },
}

/// Symmetric key bytes, wiped from memory on drop
#[derive(Clone)]
pub struct SecretKey {
    /// The actual key material
    bytes: Zeroizing<Vec<u8>>,
    /// Where the key came from
    origin: KeyOrigin,
}

impl SecretKey {
    /// Wrap caller-supplied key bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        SecretKey {
            bytes: Zeroizing::new(bytes.into()),
            origin: KeyOrigin::Raw,
        }
    }

    /// Derive a key for `scheme` from a password and an existing salt
    pub fn from_password(password: &[u8], salt: &[u8], scheme: &str) -> Result<Self> {
        let bytes = derive_key(password, salt, scheme)?;
        Ok(SecretKey {
            bytes,
            origin: KeyOrigin::Derived {
                salt: salt.to_vec(),
            },
        })
    }

    /// Derive a key for `scheme` under a freshly generated salt
    pub fn from_password_with_new_salt(
        password: &[u8],
        scheme: &str,
        random: &dyn RandomSource,
    ) -> Result<Self> {
        let salt = generate_salt_with(random)?;
        Self::from_password(password, &salt, scheme)
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn origin(&self) -> &KeyOrigin {
        &self.origin
    }

    /// Get the salt, if the key was derived
    pub fn salt(&self) -> Option<&[u8]> {
        match &self.origin {
            KeyOrigin::Raw => None,
            KeyOrigin::Derived { salt } => Some(salt),
        }
    }

    /// Label recorded in metadata sidecars
    pub fn derivation_label(&self) -> &'static str {
        match self.origin {
            KeyOrigin::Raw => "raw",
            KeyOrigin::Derived { .. } => "pbkdf2-sha256",
        }
    }

    /// Check this key against the length `scheme` requires
    pub fn validate_for(&self, scheme: &str) -> Result<()> {
        validate_key_length(&self.bytes, scheme)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("len", &self.bytes.len())
            .field("origin", &self.derivation_label())
            .finish()
    }
}
