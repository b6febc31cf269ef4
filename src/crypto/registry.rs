//! Name -> scheme registry
//!
//! Built once at startup and shared read-only (behind an `Arc`) with every
//! consumer, including concurrent batch workers.

use crate::crypto::{
    CbcScheme, ChaChaScheme, CipherScheme, GcmScheme, OsRandom, RandomSource,
};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct SchemeRegistry {
    schemes: HashMap<String, Arc<dyn CipherScheme>>,
}

impl SchemeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        SchemeRegistry {
            schemes: HashMap::new(),
        }
    }

    /// Registry holding `cbc`, `gcm` and `chacha` backed by the OS random source
    pub fn with_defaults() -> Self {
        Self::with_random(Arc::new(OsRandom))
    }

    /// Registry holding the built-in schemes, all drawing IVs and nonces from `random`
    pub fn with_random(random: Arc<dyn RandomSource>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CbcScheme::with_random(random.clone())));
        registry.register(Arc::new(GcmScheme::with_random(random.clone())));
        registry.register(Arc::new(ChaChaScheme::with_random(random)));
        registry
    }

    /// Register a scheme under its own name
    pub fn register(&mut self, scheme: Arc<dyn CipherScheme>) {
        let name = scheme.name().to_string();
        self.register_as(name, scheme);
    }

    /// Register a scheme under an explicit name; the last registration wins
    pub fn register_as(&mut self, name: impl Into<String>, scheme: Arc<dyn CipherScheme>) {
        let name = name.into();
        if self.schemes.insert(name.clone(), scheme).is_some() {
            debug!("Scheme {} re-registered, replacing previous entry", name);
        }
    }

    /// Look up a scheme; an unknown name is `None`, not an error
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn CipherScheme>> {
        self.schemes.get(name).cloned()
    }

    /// Look up a scheme, turning an unknown name into `UnsupportedScheme`
    pub fn require(&self, name: &str) -> Result<Arc<dyn CipherScheme>> {
        self.resolve(name)
            .ok_or_else(|| Error::UnsupportedScheme(name.to_string()))
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scheme that "encrypts" by hex encoding; lets tests swap in fakes
    struct FakeScheme;

    impl CipherScheme for FakeScheme {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn key_len(&self) -> usize {
            4
        }

        fn is_authenticated(&self) -> bool {
            false
        }

        fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<String> {
            self.check_key(key)?;
            Ok(hex::encode(plaintext))
        }

        fn decrypt(&self, envelope: &str, key: &[u8]) -> Result<Vec<u8>> {
            self.check_key(key)?;
            hex::decode(envelope).map_err(|e| Error::MalformedEnvelope(e.to_string()))
        }
    }

    #[test]
    fn test_defaults() {
        let registry = SchemeRegistry::with_defaults();
        assert_eq!(registry.list(), vec!["cbc", "chacha", "gcm"]);
        assert_eq!(registry.resolve("cbc").unwrap().key_len(), 16);
        assert_eq!(registry.resolve("gcm").unwrap().key_len(), 16);
        assert_eq!(registry.resolve("chacha").unwrap().key_len(), 32);
    }

    #[test]
    fn test_unknown_is_not_found() {
        let registry = SchemeRegistry::with_defaults();
        assert!(registry.resolve("blowfish").is_none());
        assert!(matches!(
            registry.require("blowfish"),
            Err(Error::UnsupportedScheme(name)) if name == "blowfish"
        ));
    }

    #[test]
    fn test_fake_scheme() {
        let mut registry = SchemeRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(FakeScheme));

        let scheme = registry.resolve("fake").unwrap();
        let envelope = scheme.encrypt(b"hi", b"abcd").unwrap();
        assert_eq!(envelope, "6869");
        assert_eq!(scheme.decrypt(&envelope, b"abcd").unwrap(), b"hi");
        assert!(scheme.encrypt(b"hi", b"abc").is_err());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = SchemeRegistry::with_defaults();
        registry.register_as("cbc", Arc::new(FakeScheme));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.resolve("cbc").unwrap().name(), "fake");
    }
}
