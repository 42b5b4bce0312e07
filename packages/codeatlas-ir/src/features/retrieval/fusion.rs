//! Intent-weighted Reciprocal Rank Fusion.
//!
//! `rrf = 1 / (k + rank)` per strategy, weights derived from the intent
//! vector, a consensus factor rewarding multi-strategy agreement, then an
//! intent-specific cutoff. Ordering is fully deterministic.

use super::intent::{Intent, IntentProbability};
use super::strategy::SearchHit;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutoffPolicy {
    pub top_k: usize,
    /// Drop hits scoring below this fraction of the top score.
    pub min_score_ratio: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub rrf_k: f32,
    pub consensus_alpha: f32,
    pub symbol_cutoff: CutoffPolicy,
    pub flow_cutoff: CutoffPolicy,
    pub concept_cutoff: CutoffPolicy,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            consensus_alpha: 0.2,
            symbol_cutoff: CutoffPolicy {
                top_k: 20,
                min_score_ratio: 0.1,
            },
            flow_cutoff: CutoffPolicy {
                top_k: 20,
                min_score_ratio: 0.5,
            },
            concept_cutoff: CutoffPolicy {
                top_k: 20,
                min_score_ratio: 0.2,
            },
        }
    }
}

impl FusionConfig {
    fn cutoff_for(&self, intent: Intent) -> CutoffPolicy {
        match intent {
            Intent::Symbol => self.symbol_cutoff,
            Intent::Flow => self.flow_cutoff,
            Intent::Concept => self.concept_cutoff,
        }
    }
}

/// Per-axis strategy weight profiles. A flow-dominant query leans on the
/// graph strategy, a symbol-dominant one on the symbol index.
fn axis_profile(intent: Intent, strategy: &str) -> f32 {
    match intent {
        Intent::Symbol => match strategy {
            "symbol" => 0.5,
            "lexical" => 0.2,
            "vector" => 0.15,
            "graph" => 0.15,
            _ => 0.1,
        },
        Intent::Flow => match strategy {
            "graph" => 0.5,
            "lexical" => 0.2,
            "symbol" => 0.15,
            "vector" => 0.15,
            _ => 0.1,
        },
        Intent::Concept => match strategy {
            "vector" => 0.5,
            "lexical" => 0.25,
            "graph" => 0.15,
            "symbol" => 0.1,
            _ => 0.1,
        },
    }
}

/// Intent-blended weights over the strategies present, normalized to sum 1.
pub fn weights_for(intent: &IntentProbability, strategies: &[String]) -> BTreeMap<String, f32> {
    let mut weights: BTreeMap<String, f32> = BTreeMap::new();
    for strategy in strategies {
        let w = intent.symbol * axis_profile(Intent::Symbol, strategy)
            + intent.flow * axis_profile(Intent::Flow, strategy)
            + intent.concept * axis_profile(Intent::Concept, strategy);
        weights.insert(strategy.clone(), w);
    }
    let sum: f32 = weights.values().sum();
    if sum > 0.0 {
        for w in weights.values_mut() {
            *w /= sum;
        }
    }
    weights
}

/// Rank bookkeeping for one chunk across strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRanks {
    pub ranks: BTreeMap<String, usize>,
    pub rrf: BTreeMap<String, f32>,
    pub num_strategies: usize,
    pub best_rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<String>,
}

/// Intent-independent RRF table: cacheable per hit-set fingerprint so the
/// same hits reranked under a different intent skip recomputation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RrfTable {
    pub per_chunk: BTreeMap<String, ChunkRanks>,
    pub strategies: Vec<String>,
}

pub fn compute_rrf(hits_by_strategy: &HashMap<String, Vec<SearchHit>>, k: f32) -> RrfTable {
    let mut table = RrfTable::default();
    let mut strategies: Vec<String> = hits_by_strategy.keys().cloned().collect();
    strategies.sort();
    table.strategies = strategies.clone();

    for strategy in &strategies {
        for (rank, hit) in hits_by_strategy[strategy].iter().enumerate() {
            let entry = table
                .per_chunk
                .entry(hit.chunk_id.clone())
                .or_insert_with(|| ChunkRanks {
                    ranks: BTreeMap::new(),
                    rrf: BTreeMap::new(),
                    num_strategies: 0,
                    best_rank: usize::MAX,
                    file_path: None,
                    symbol_id: None,
                });
            // rank is 1-based in the RRF denominator
            entry.ranks.insert(strategy.clone(), rank);
            entry
                .rrf
                .insert(strategy.clone(), 1.0 / (k + rank as f32 + 1.0));
            entry.num_strategies += 1;
            entry.best_rank = entry.best_rank.min(rank);
            if entry.file_path.is_none() {
                entry.file_path = hit.file_path.clone();
            }
            if entry.symbol_id.is_none() {
                entry.symbol_id = hit.symbol_id.clone();
            }
        }
    }
    table
}

/// One fused result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedHit {
    pub chunk_id: String,
    pub final_score: f32,
    pub num_strategies: usize,
    pub best_rank: usize,
    pub ranks: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    pub explanation: String,
}

/// Weight + consensus application over a precomputed RRF table.
pub fn apply_weights(
    table: &RrfTable,
    intent: &IntentProbability,
    config: &FusionConfig,
) -> Vec<FusedHit> {
    let weights = weights_for(intent, &table.strategies);

    let mut fused: Vec<FusedHit> = table
        .per_chunk
        .iter()
        .map(|(chunk_id, ranks)| {
            let consensus = 1.0 + config.consensus_alpha * (ranks.num_strategies as f32 - 1.0);
            let weighted: f32 = ranks
                .rrf
                .iter()
                .map(|(s, rrf)| weights.get(s).copied().unwrap_or(0.0) * rrf)
                .sum();
            let final_score = weighted * consensus;
            FusedHit {
                chunk_id: chunk_id.clone(),
                final_score,
                num_strategies: ranks.num_strategies,
                best_rank: ranks.best_rank,
                ranks: ranks.ranks.clone(),
                file_path: ranks.file_path.clone(),
                symbol_id: ranks.symbol_id.clone(),
                metadata: HashMap::new(),
                explanation: format!(
                    "{} strategies, best_rank={}, consensus={:.2}",
                    ranks.num_strategies, ranks.best_rank, consensus
                ),
            }
        })
        .collect();

    // Deterministic order: score desc, consensus desc, best rank asc,
    // lexicographic chunk id.
    fused.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| b.num_strategies.cmp(&a.num_strategies))
            .then_with(|| a.best_rank.cmp(&b.best_rank))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    fused
}

/// Intent-specific top-k and min-score cutoff.
pub fn apply_cutoff(
    mut fused: Vec<FusedHit>,
    intent: &IntentProbability,
    config: &FusionConfig,
) -> Vec<FusedHit> {
    let policy = config.cutoff_for(intent.dominant());
    let top_score = fused.first().map(|h| h.final_score).unwrap_or(0.0);
    let floor = top_score * policy.min_score_ratio;
    fused.retain(|h| h.final_score >= floor);
    fused.truncate(policy.top_k);
    fused
}

/// Full fusion pipeline for one hit set.
pub fn fuse(
    hits_by_strategy: &HashMap<String, Vec<SearchHit>>,
    intent: &IntentProbability,
    config: &FusionConfig,
) -> Vec<FusedHit> {
    let table = compute_rrf(hits_by_strategy, config.rrf_k);
    let fused = apply_weights(&table, intent, config);
    apply_cutoff(fused, intent, config)
}
