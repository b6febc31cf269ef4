//! Cryptography module for crypto-cli
//!
//! Provides the pluggable cipher engine: AES-128-CBC (confidentiality only),
//! AES-128-GCM and ChaCha20-Poly1305 (authenticated), PBKDF2-HMAC-SHA256 key
//! derivation and the name -> scheme registry the rest of the crate resolves
//! schemes through.

mod aead;
mod aes_cbc;
mod chacha;
mod gcm;
mod kdf;
mod keys;
mod padding;
mod random;
mod registry;
mod scheme;

pub use aes_cbc::{CbcDecryptor, CbcEncryptor, CbcScheme};
pub use chacha::ChaChaScheme;
pub use gcm::GcmScheme;
pub use kdf::{
    decode_salt, derive_key, encode_salt, generate_salt, generate_salt_with, required_key_length,
    validate_key_length, SCHEME_KEY_LENGTHS,
};
pub use keys::{KeyOrigin, SecretKey};
pub use padding::{pkcs7_pad, pkcs7_unpad};
pub use random::{OsRandom, RandomSource};
pub use registry::SchemeRegistry;
pub use scheme::CipherScheme;

/// AES block size in bytes (also the CBC IV size)
pub const BLOCK_SIZE: usize = 16;

/// Size of GCM / ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of AEAD authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Size of salt for key derivation
pub const SALT_SIZE: usize = 16;

/// PBKDF2 iteration count; changing it breaks decryption of existing data
pub const PBKDF2_ITERATIONS: u32 = 10_000;

/// Scheme names
pub const SCHEME_CBC: &str = "cbc";
pub const SCHEME_GCM: &str = "gcm";
pub const SCHEME_CHACHA: &str = "chacha";
