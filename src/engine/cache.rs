//! Evaluation result caching for repeated data requests
//!
//! Uses moka for thread-safe concurrent caching with TTL-based expiration.

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::executor::Evaluation;
use super::grid::TimeGrid;
use crate::view::DataView;

/// Whether a request may be served from the cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheBehavior {
    #[default]
    #[serde(alias = "useCache", alias = "usecache")]
    UseCache,
    /// Recompute and replace the cached entry
    #[serde(alias = "refresh")]
    Refresh,
}

/// Cache key for evaluation results.
///
/// The fingerprint covers the whole view document, so two structurally
/// identical views share entries and any edit produces a new key.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct CacheKey {
    view_id: String,
    fingerprint: u64,
    start: i64,
    end: i64,
    interval: i64,
}

impl CacheKey {
    pub fn new(view: &DataView, grid: &TimeGrid) -> Self {
        Self {
            view_id: view.id.clone(),
            fingerprint: view.fingerprint(),
            start: grid.start,
            end: grid.end,
            interval: grid.interval,
        }
    }

    pub fn view_id(&self) -> &str {
        &self.view_id
    }
}

/// Result cache with TTL and per-view invalidation
pub struct ResultCache {
    cache: Cache<CacheKey, Arc<Evaluation>>,
    hits: AtomicU64,
    misses: AtomicU64,
    ttl: Duration,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_config(1000, Duration::from_secs(300))
    }

    pub fn with_config(max_entries: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<Evaluation>> {
        if let Some(result) = self.cache.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(view_id = %key.view_id, "Cache hit");
            Some(result)
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(view_id = %key.view_id, "Cache miss");
            None
        }
    }

    pub fn put(&self, key: CacheKey, result: Arc<Evaluation>) {
        self.cache.insert(key, result);
    }

    /// Drop every entry of a view, whatever its revision or time range
    pub fn invalidate_view(&self, view_id: &str) {
        let keys: Vec<CacheKey> = self
            .cache
            .iter()
            .filter(|(key, _)| key.view_id() == view_id)
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in keys {
            self.cache.invalidate(&key);
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            entry_count: self.cache.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Hit rate (0.0 - 1.0)
    pub hit_rate: f64,
    pub entry_count: u64,
    pub ttl_secs: u64,
}
