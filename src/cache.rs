//! Content fingerprints and the import-resolution cache
//!
//! The cache is owned by a resolver instance and shared between compilation
//! units through it. Reads take a shared lock; inserts take the write lock
//! for a single map operation. Cached results are never mutated.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::resolver::Resolution;

/// SHA-256 of `text`, lowercase hex.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Exact `(specifier, importedItems)` pair. Item order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub specifier: String,
    pub items: Vec<String>,
}

impl CacheKey {
    pub fn new(specifier: &str, items: &[String]) -> Self {
        CacheKey {
            specifier: specifier.to_string(),
            items: items.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub resolved: usize,
    pub unresolved: usize,
}

/// Resolved and unresolved outcomes live in separate tables.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    resolved: RwLock<HashMap<CacheKey, Resolution>>,
    unresolved: RwLock<HashMap<CacheKey, Resolution>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Resolution> {
        if let Some(hit) = self.resolved.read().get(key) {
            return Some(hit.clone());
        }
        self.unresolved.read().get(key).cloned()
    }

    /// Stores `resolution` unless the key is already cached, in which case
    /// the first stored result is kept and returned.
    pub fn insert(&self, key: CacheKey, resolution: Resolution) -> Resolution {
        let table = if resolution.is_valid {
            &self.resolved
        } else {
            &self.unresolved
        };
        table.write().entry(key).or_insert(resolution).clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resolved: self.resolved.read().len(),
            unresolved: self.unresolved.read().len(),
        }
    }

    pub fn clear(&self) {
        self.resolved.write().clear();
        self.unresolved.write().clear();
    }
}
