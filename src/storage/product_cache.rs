//! Product Cache Module
//!
//! Short-lived in-memory cache of aggregation results keyed by the requested
//! currency and period. Entries are checked against the TTL on read and never
//! evicted otherwise; the key space is at most 3 currencies x 3 periods.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::product::{Currency, Period, Product};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Cache key: the query parameters of one dashboard request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub currency: Currency,
    pub period: Period,
}

impl CacheKey {
    pub fn new(currency: Currency, period: Period) -> Self {
        Self { currency, period }
    }
}

/// Whether a lookup was served from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    products: Vec<Product>,
    written_at: Instant,
}

// ============================================================================
// STORAGE IMPLEMENTATION
// ============================================================================

/// TTL cache for aggregated product lists.
///
/// Reads and writes are last-writer-wins snapshots behind a `RwLock`.
/// Concurrent misses for the same key are not de-duplicated.
pub struct ProductCache {
    ttl: Duration,
    /// Map of key -> last written result
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl ProductCache {
    /// Create a new cache with the given freshness window.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a fresh entry.
    ///
    /// # Returns
    ///
    /// * `Some(products)` if an entry exists and is younger than the TTL
    /// * `None` if missing or stale
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<Product>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.written_at.elapsed() < self.ttl)
            .map(|entry| entry.products.clone())
    }

    /// Store a result.
    ///
    /// Empty results are never cached so an exchange outage is retried on the
    /// next request instead of being served for a full TTL.
    ///
    /// # Returns
    ///
    /// `true` if the entry was written
    pub async fn put(&self, key: CacheKey, products: Vec<Product>) -> bool {
        if products.is_empty() {
            debug!("Skipping cache write for {:?}: empty result", key);
            return false;
        }
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                products,
                written_at: Instant::now(),
            },
        );
        true
    }

    /// Serve `key` from the cache, or run `loader` and cache its result.
    ///
    /// A loader error is returned as is and nothing is written. If the caller
    /// drops this future while `loader` is running, nothing is written either.
    pub async fn get_or_refresh<F, Fut, E>(
        &self,
        key: CacheKey,
        loader: F,
    ) -> Result<(Vec<Product>, CacheStatus), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Product>, E>>,
    {
        if let Some(products) = self.get(&key).await {
            debug!("Cache hit for {:?}", key);
            return Ok((products, CacheStatus::Hit));
        }

        debug!("Cache miss for {:?}", key);
        let products = loader().await?;
        self.put(key, products.clone()).await;
        Ok((products, CacheStatus::Miss))
    }

    /// Number of stored entries, fresh or stale.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
