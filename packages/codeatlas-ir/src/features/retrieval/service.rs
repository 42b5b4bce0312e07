//! Retriever service: intent classification → fusion → cutoff, with the
//! three-tier cache in front.

use super::cache::{DistributedCache, RetrievalCache, RetrievalCacheConfig};
use super::fusion::{self, FusionConfig, FusedHit};
use super::intent::{IntentClassifier, IntentProbability};
use super::strategy::{SearchHit, StrategyFanout};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub enable_cache: bool,
    pub enable_query_expansion: bool,
    pub fusion: FusionConfig,
    pub cache: RetrievalCacheConfig,
    /// Deadline for the strategy fan-out.
    pub strategy_deadline: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            enable_query_expansion: true,
            fusion: FusionConfig::default(),
            cache: RetrievalCacheConfig::default(),
            strategy_deadline: Duration::from_secs(2),
        }
    }
}

pub struct RetrieverService {
    config: RetrieverConfig,
    classifier: IntentClassifier,
    cache: RetrievalCache,
    l2: Option<Arc<dyn DistributedCache>>,
}

impl RetrieverService {
    pub fn new(config: RetrieverConfig) -> Self {
        let classifier = IntentClassifier::new(config.enable_query_expansion);
        let cache = RetrievalCache::new(&config.cache);
        Self {
            config,
            classifier,
            cache,
            l2: None,
        }
    }

    pub fn with_l2(mut self, l2: Arc<dyn DistributedCache>) -> Self {
        self.l2 = Some(l2);
        self
    }

    /// Full retrieval pipeline over caller-provided per-strategy hits.
    ///
    /// Tier 1: full results. Tier 2: intent vector. Tier 3: RRF table keyed
    /// by the hit-set fingerprint, so identical hits reranked under another
    /// intent skip rank recomputation.
    pub fn retrieve(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        query: &str,
        hits_by_strategy: &HashMap<String, Vec<SearchHit>>,
        metadata_map: Option<&HashMap<String, HashMap<String, serde_json::Value>>>,
    ) -> (Vec<FusedHit>, IntentProbability) {
        let use_cache = self.config.enable_cache;

        if use_cache {
            let key = RetrievalCache::query_key(repo_id, snapshot_id, query);
            if let Some((results, intent)) = self.cache.query_results.get(&key) {
                debug!(repo_id, tier = "query", "retrieval cache hit");
                return (results, intent);
            }
        }

        // Intent tier
        let intent_key = RetrievalCache::intent_key(repo_id, snapshot_id, query);
        let intent = if use_cache {
            self.cache.intents.get(&intent_key).map(|(i, _)| i)
        } else {
            None
        };
        let intent = match intent {
            Some(i) => i,
            None => {
                let (intent, expansions) = self.classifier.classify_with_expansion(query);
                if use_cache {
                    self.cache.intents.set(intent_key, (intent, expansions));
                }
                intent
            }
        };

        // RRF tier
        let fingerprint = RetrievalCache::hits_fingerprint(hits_by_strategy);
        let rrf_key = RetrievalCache::rrf_key(repo_id, &fingerprint);
        let table = if use_cache {
            self.cache.rrf_tables.get(&rrf_key)
        } else {
            None
        };
        let table = match table {
            Some(t) => t,
            None => {
                let t = fusion::compute_rrf(hits_by_strategy, self.config.fusion.rrf_k);
                if use_cache {
                    self.cache.rrf_tables.set(rrf_key, t.clone());
                }
                t
            }
        };

        let fused = fusion::apply_weights(&table, &intent, &self.config.fusion);
        let mut results = fusion::apply_cutoff(fused, &intent, &self.config.fusion);

        if let Some(metadata_map) = metadata_map {
            for hit in &mut results {
                if let Some(meta) = metadata_map.get(&hit.chunk_id) {
                    hit.metadata = meta.clone();
                }
            }
        }

        info!(
            repo_id,
            results = results.len(),
            dominant = intent.dominant().as_str(),
            "retrieval complete"
        );

        if use_cache {
            let key = RetrievalCache::query_key(repo_id, snapshot_id, query);
            self.cache
                .query_results
                .set(key.clone(), (results.clone(), intent));

            if let Some(l2) = &self.l2 {
                if let Ok(bytes) = serde_json::to_vec(&results) {
                    l2.set(&key, bytes, self.config.cache.ttl);
                }
            }
        }

        (results, intent)
    }

    /// Fan out to live strategies, then fuse.
    pub async fn retrieve_with_strategies(
        &self,
        repo_id: &str,
        snapshot_id: &str,
        query: &str,
        fanout: &StrategyFanout,
        limit: usize,
    ) -> (Vec<FusedHit>, IntentProbability) {
        let hits = fanout.gather(query, limit).await;
        self.retrieve(repo_id, snapshot_id, query, &hits, None)
    }

    pub fn cache_stats(&self) -> [(&'static str, super::cache::TierStats); 3] {
        [
            ("query", self.cache.query_results.stats()),
            ("intent", self.cache.intents.stats()),
            ("rrf", self.cache.rrf_tables.stats()),
        ]
    }

    pub fn clear_cache(&self) {
        self.cache.clear_all();
    }
}
