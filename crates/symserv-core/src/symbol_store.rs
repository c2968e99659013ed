//! Component D: the second-level, shared symbol-map store.
//!
//! Values are kept as their compact binary encoding -- the map dominates
//! memory, so it is kept encoded rather than as a live `HashMap` for every
//! cached module -- and decoded lazily on read. Positive
//! entries never expire except under LRU pressure; negative entries expire
//! after `negative_ttl`, implemented with a per-entry [`moka::Expiry`]
//! rather than a cache-wide TTL, since the two kinds of entry need
//! different policies in the same cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::{Cache, CacheBuilder};
use moka::Expiry;

use crate::key::ModuleKey;
use crate::sym_file::OffsetTable;

#[derive(Clone)]
enum StoredEntry {
    Positive(Arc<Vec<u8>>),
    Negative,
}

/// The outcome of looking up one module in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Positive(OffsetTable),
    /// The negative sentinel: previously attempted, nothing usable found.
    Negative,
    /// Never seen before; the caller must fetch it.
    Missing,
}

struct NegativeOnlyExpiry {
    negative_ttl: Duration,
}

impl Expiry<ModuleKey, StoredEntry> for NegativeOnlyExpiry {
    fn expire_after_create(
        &self,
        _key: &ModuleKey,
        value: &StoredEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        match value {
            StoredEntry::Positive(_) => None,
            StoredEntry::Negative => Some(self.negative_ttl),
        }
    }

    /// Without this, moka's default keeps an updated entry's *existing*
    /// duration: a `Negative` racing a concurrent `Positive` write for the
    /// same key would otherwise leave the overwriting `Positive` entry
    /// expiring on the stale negative TTL instead of living forever.
    fn expire_after_update(
        &self,
        _key: &ModuleKey,
        value: &StoredEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        match value {
            StoredEntry::Positive(_) => None,
            StoredEntry::Negative => Some(self.negative_ttl),
        }
    }
}

pub struct SymbolMapStore {
    inner: Cache<ModuleKey, StoredEntry>,
}

impl SymbolMapStore {
    /// `max_capacity` bounds the store by weighted entry count (LRU
    /// eviction); `negative_ttl` is `SYMBOLDOWNLOAD_MAX_TTL_SECONDS`
    /// (one hour recommended, shortened in development mode).
    pub fn new(max_capacity: u64, negative_ttl: Duration) -> Self {
        let inner = CacheBuilder::new(max_capacity)
            .expire_after(NegativeOnlyExpiry { negative_ttl })
            .build();
        SymbolMapStore { inner }
    }

    /// A single round-trip multi-get over all requested keys.
    pub fn bulk_get(&self, keys: &[ModuleKey]) -> HashMap<ModuleKey, LookupResult> {
        keys.iter()
            .map(|key| {
                let result = match self.inner.get(key) {
                    None => LookupResult::Missing,
                    Some(StoredEntry::Negative) => LookupResult::Negative,
                    Some(StoredEntry::Positive(bytes)) => match OffsetTable::from_bytes(&bytes) {
                        Ok(table) => LookupResult::Positive(table),
                        Err(_) => LookupResult::Missing,
                    },
                };
                (key.clone(), result)
            })
            .collect()
    }

    pub fn put_positive(&self, key: ModuleKey, table: &OffsetTable) -> Result<(), bincode::Error> {
        let bytes = table.to_bytes()?;
        self.inner.insert(key, StoredEntry::Positive(Arc::new(bytes)));
        Ok(())
    }

    pub fn put_negative(&self, key: ModuleKey) {
        self.inner.insert(key, StoredEntry::Negative);
    }
}
