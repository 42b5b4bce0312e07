//! Three-tier retrieval cache.
//!
//! Tiers: full query results, intent vectors, and intent-independent RRF
//! tables (keyed by a hit-set fingerprint). Invalidation is purely
//! epoch-based — every new snapshot_id produces disjoint keys, so nothing is
//! ever purged. Each tier has its own lock.

use super::fusion::{FusedHit, RrfTable};
use super::intent::IntentProbability;
use super::strategy::SearchHit;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TierStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
}

/// LRU with per-entry TTL.
pub struct TtlLru<V> {
    inner: Mutex<LruCache<String, (Instant, V)>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
}

impl<V: Clone> TtlLru<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        match inner.get(key) {
            Some((stored, value)) if stored.elapsed() < self.ttl => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            Some(_) => {
                inner.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, key: String, value: V) {
        self.stores.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().put(key, (Instant::now(), value));
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

/// Optional distributed second tier, keyed identically to L1. Values are
/// opaque serialized bytes.
pub trait DistributedCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
}

#[derive(Debug, Clone)]
pub struct RetrievalCacheConfig {
    pub query_capacity: usize,
    pub intent_capacity: usize,
    pub rrf_capacity: usize,
    pub ttl: Duration,
}

impl Default for RetrievalCacheConfig {
    fn default() -> Self {
        Self {
            query_capacity: 512,
            intent_capacity: 1024,
            rrf_capacity: 512,
            ttl: Duration::from_secs(300),
        }
    }
}

pub struct RetrievalCache {
    pub query_results: TtlLru<(Vec<FusedHit>, IntentProbability)>,
    pub intents: TtlLru<(IntentProbability, Vec<String>)>,
    pub rrf_tables: TtlLru<RrfTable>,
}

impl RetrievalCache {
    pub fn new(config: &RetrievalCacheConfig) -> Self {
        Self {
            query_results: TtlLru::new(config.query_capacity, config.ttl),
            intents: TtlLru::new(config.intent_capacity, config.ttl),
            rrf_tables: TtlLru::new(config.rrf_capacity, config.ttl),
        }
    }

    pub fn query_key(repo_id: &str, snapshot_id: &str, query: &str) -> String {
        format!("q:{}:{}:{}", repo_id, snapshot_id, query)
    }

    pub fn intent_key(repo_id: &str, snapshot_id: &str, query: &str) -> String {
        format!("i:{}:{}:{}", repo_id, snapshot_id, query)
    }

    pub fn rrf_key(repo_id: &str, fingerprint: &str) -> String {
        format!("r:{}:{}", repo_id, fingerprint)
    }

    /// Stable fingerprint over the hit set: sorted strategies, top chunk ids
    /// per strategy.
    pub fn hits_fingerprint(hits_by_strategy: &HashMap<String, Vec<SearchHit>>) -> String {
        let mut strategies: Vec<&String> = hits_by_strategy.keys().collect();
        strategies.sort();

        let mut hasher = Sha256::new();
        for strategy in strategies {
            hasher.update(strategy.as_bytes());
            hasher.update([0u8]);
            for hit in hits_by_strategy[strategy].iter().take(50) {
                hasher.update(hit.chunk_id.as_bytes());
                hasher.update([1u8]);
            }
            hasher.update([2u8]);
        }
        let digest = hasher.finalize();
        let mut out = String::with_capacity(32);
        for b in &digest[..16] {
            out.push_str(&format!("{:02x}", b));
        }
        out
    }

    pub fn clear_all(&self) {
        self.query_results.clear();
        self.intents.clear();
        self.rrf_tables.clear();
    }
}
