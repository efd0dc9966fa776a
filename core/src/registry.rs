//! Stable asset identifiers and the name → id registrar.
//!
//! Every human-readable asset key (a file path, `"Mat_Wood"`, ...) maps to
//! exactly one [`AssetId`] for the lifetime of the process. Ids are minted
//! from a process-wide counter and never reused, even across registries.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque 64-bit asset identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(u64);

impl AssetId {
    /// The id returned for unknown keys. Never minted.
    pub const INVALID: AssetId = AssetId(0);

    /// Mint a fresh id, unique for the process lifetime.
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw value (e.g. read back from a saved project).
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this id is [`AssetId::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Name → id registrar.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    ids: HashMap<String, AssetId>,
    names: HashMap<AssetId, String>,
}

impl AssetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key`, returning its id.
    ///
    /// A key that is already registered keeps its id; the call logs a warning
    /// and returns the existing one.
    pub fn register(&mut self, key: &str) -> AssetId {
        if let Some(&id) = self.ids.get(key) {
            log::warn!("Key '{key}' already exists! Returning existing id {id}");
            return id;
        }

        let id = AssetId::new();
        self.ids.insert(key.to_string(), id);
        self.names.insert(id, key.to_string());
        log::trace!("AssetRegistry: registered '{key}' as {id}");
        id
    }

    /// Look up the id for `key`, or [`AssetId::INVALID`] if it was never registered.
    pub fn get(&self, key: &str) -> AssetId {
        match self.ids.get(key) {
            Some(&id) => id,
            None => {
                log::error!("Key '{key}' not found in asset registry");
                AssetId::INVALID
            }
        }
    }

    /// Whether `key` has been registered.
    pub fn exists(&self, key: &str) -> bool {
        self.ids.contains_key(key)
    }

    /// Reverse lookup.
    pub fn name_of(&self, id: AssetId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_stable() {
        let mut registry = AssetRegistry::new();
        let a = registry.register("Textures/wood.png");
        let b = registry.register("Textures/wood.png");
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Textures/wood.png"), a);
    }

    #[test]
    fn test_distinct_keys_get_distinct_ids() {
        let mut registry = AssetRegistry::new();
        let a = registry.register("a");
        let b = registry.register("b");
        assert_ne!(a, b);
        assert!(a.is_valid() && b.is_valid());
    }

    #[test]
    fn test_ids_are_unique_across_registries() {
        let mut first = AssetRegistry::new();
        let mut second = AssetRegistry::new();
        assert_ne!(first.register("same"), second.register("same"));
    }

    #[test]
    fn test_missing_key() {
        let registry = AssetRegistry::new();
        assert_eq!(registry.get("missing"), AssetId::INVALID);
        assert!(!registry.exists("missing"));
    }

    #[test]
    fn test_name_of() {
        let mut registry = AssetRegistry::new();
        let id = registry.register("Shaders/Lighting.shader");
        assert_eq!(registry.name_of(id), Some("Shaders/Lighting.shader"));
        assert_eq!(registry.name_of(AssetId::INVALID), None);
    }
}
