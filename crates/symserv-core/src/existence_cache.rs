//! Component B: a short-TTL, in-process existence cache.
//!
//! Backed by `moka`'s synchronous cache, which already combines
//! size-bounded LRU eviction with per-entry TTL, covering the in-memory
//! side of the existence-check fast path without a separate external
//! key-value store.

use std::time::{Duration, Instant};

use moka::sync::{Cache, CacheBuilder};

use crate::key::DownloadKey;

/// What the existence cache knows about a `(debug_file, debug_id, symbol_filename)`.
#[derive(Debug, Clone)]
pub enum Existence {
    Present {
        origin_index: usize,
        url: String,
        probed_at: Instant,
    },
    Absent {
        probed_at: Instant,
    },
}

pub struct ExistenceCache {
    inner: Cache<DownloadKey, Existence>,
}

impl ExistenceCache {
    /// `max_size` is `SYMBOLDOWNLOAD_EXISTS_TIMEOUT_MAXSIZE` (default 10,000);
    /// `ttl` is `SYMBOLDOWNLOAD_MAX_TTL_SECONDS` (default one hour).
    pub fn new(max_size: u64, ttl: Duration) -> Self {
        let inner = CacheBuilder::new(max_size).time_to_live(ttl).build();
        ExistenceCache { inner }
    }

    pub fn get(&self, key: &DownloadKey) -> Option<Existence> {
        self.inner.get(key)
    }

    pub fn put_present(&self, key: DownloadKey, origin_index: usize, url: String) {
        self.inner.insert(
            key,
            Existence::Present {
                origin_index,
                url,
                probed_at: Instant::now(),
            },
        );
    }

    pub fn put_absent(&self, key: DownloadKey) {
        self.inner.insert(
            key,
            Existence::Absent {
                probed_at: Instant::now(),
            },
        );
    }

}
