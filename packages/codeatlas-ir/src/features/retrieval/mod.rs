//! Hybrid retrieval: strategy fan-out fused by intent-weighted RRF behind a
//! three-tier cache.

pub mod cache;
pub mod fusion;
pub mod intent;
pub mod service;
pub mod strategy;

pub use cache::{DistributedCache, RetrievalCache, RetrievalCacheConfig, TierStats};
pub use fusion::{CutoffPolicy, FusedHit, FusionConfig, RrfTable};
pub use intent::{Intent, IntentClassifier, IntentProbability};
pub use service::{RetrieverConfig, RetrieverService};
pub use strategy::{SearchHit, SearchStrategy, StrategyFanout, SymbolStrategy};
