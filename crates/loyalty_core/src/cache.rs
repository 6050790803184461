//! Bounded molecule-configuration cache.
//!
//! # Responsibility
//! - Hold recently resolved `MoleculeConfig` entries per `(tenant, key)`.
//! - Evict least-recently-used entries once capacity is reached.
//!
//! # Invariants
//! - The cache is an explicit object constructed at startup and handed to the
//!   resolver; there is no ambient singleton.
//! - `encode` writes invalidate the affected entry so cached value sets never
//!   go stale within a process.

use crate::model::molecule::{MoleculeConfig, TenantId};
use indexmap::IndexMap;

type CacheKey = (TenantId, String);

/// Explicit LRU cache over merged molecule configurations.
#[derive(Debug)]
pub struct MoleculeCache {
    capacity: usize,
    entries: IndexMap<CacheKey, MoleculeConfig>,
}

impl MoleculeCache {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: IndexMap::new(),
        }
    }

    /// Returns a clone of the cached config, promoting it to most-recent.
    pub fn get(&mut self, tenant: TenantId, key: &str) -> Option<MoleculeConfig> {
        let cache_key = (tenant, key.to_string());
        let config = self.entries.shift_remove(&cache_key)?;
        self.entries.insert(cache_key, config.clone());
        Some(config)
    }

    /// Stores a config, evicting the least-recently-used entry when full.
    pub fn insert(&mut self, tenant: TenantId, key: &str, config: MoleculeConfig) {
        let cache_key = (tenant, key.to_string());
        self.entries.shift_remove(&cache_key);
        if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(cache_key, config);
    }

    /// Drops one entry; used after catalog writes touching the molecule.
    pub fn invalidate(&mut self, tenant: TenantId, key: &str) {
        self.entries.shift_remove(&(tenant, key.to_string()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::MoleculeCache;
    use crate::model::molecule::{
        MoleculeConfig, MoleculeDefinition, TenantId, ValueKind,
    };
    use uuid::Uuid;

    fn config(id: i64, tenant: TenantId, key: &str) -> MoleculeConfig {
        MoleculeConfig {
            definition: MoleculeDefinition {
                id,
                tenant_id: tenant,
                molecule_key: key.to_string(),
                label: key.to_string(),
                value_kind: ValueKind::Scalar,
                scalar_type: None,
                constant_value: None,
                generator: None,
                input_type: None,
                display_width: None,
                contextual: false,
                historized: false,
                filter_by: None,
            },
            values: Vec::new(),
            lookup: None,
        }
    }

    #[test]
    fn evicts_least_recently_used_entry() {
        let tenant = Uuid::new_v4();
        let mut cache = MoleculeCache::new(2);
        cache.insert(tenant, "a", config(1, tenant, "a"));
        cache.insert(tenant, "b", config(2, tenant, "b"));

        // Touch `a` so `b` becomes the eviction candidate.
        assert!(cache.get(tenant, "a").is_some());
        cache.insert(tenant, "c", config(3, tenant, "c"));

        assert!(cache.get(tenant, "b").is_none());
        assert!(cache.get(tenant, "a").is_some());
        assert!(cache.get(tenant, "c").is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn invalidate_drops_single_entry() {
        let tenant = Uuid::new_v4();
        let mut cache = MoleculeCache::new(4);
        cache.insert(tenant, "a", config(1, tenant, "a"));
        cache.insert(tenant, "b", config(2, tenant, "b"));

        cache.invalidate(tenant, "a");
        assert!(cache.get(tenant, "a").is_none());
        assert!(cache.get(tenant, "b").is_some());
    }

    #[test]
    fn capacity_is_never_zero() {
        let tenant = Uuid::new_v4();
        let mut cache = MoleculeCache::new(0);
        cache.insert(tenant, "a", config(1, tenant, "a"));
        assert_eq!(cache.len(), 1);
    }
}
