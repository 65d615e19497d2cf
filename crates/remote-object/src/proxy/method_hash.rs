//! Method signature hashes
//!
//! Calls identify their target method by a 64-bit hash of the method's name
//! and signature. The hash is deterministic, so concurrent first lookups may
//! both compute it and the later store simply overwrites an equal value.

use super::descriptor::MethodDescriptor;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Compute the hash of `name(signature)`: the first 8 bytes of its SHA-256
/// digest, least significant byte first.
pub fn compute_method_hash(method: &MethodDescriptor) -> i64 {
    let digest = Sha256::digest(method.name_and_signature().as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_le_bytes(bytes)
}

/// Hash cache keyed by interface name, then by method name and signature
#[derive(Debug, Default)]
pub struct MethodHashCache {
    interfaces: RwLock<HashMap<&'static str, HashMap<String, i64>>>,
}

static GLOBAL: LazyLock<MethodHashCache> = LazyLock::new(MethodHashCache::new);

impl MethodHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache
    pub fn global() -> &'static MethodHashCache {
        &GLOBAL
    }

    /// The hash for `method`, computed on first use
    pub fn hash(&self, method: &MethodDescriptor) -> i64 {
        let key = method.name_and_signature();
        {
            let interfaces = self.interfaces.read();
            if let Some(hash) = interfaces
                .get(method.interface)
                .and_then(|methods| methods.get(&key))
            {
                return *hash;
            }
        }

        // Computed outside the lock; a racing writer stores the same value
        let hash = compute_method_hash(method);
        let mut interfaces = self.interfaces.write();
        interfaces
            .entry(method.interface)
            .or_default()
            .insert(key, hash);
        hash
    }

    /// Number of cached method hashes
    pub fn len(&self) -> usize {
        self.interfaces.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash of `method` through the process-wide cache
pub fn method_hash(method: &MethodDescriptor) -> i64 {
    MethodHashCache::global().hash(method)
}
