//! Retrieval strategy port and bounded parallel fan-out.
//!
//! Strategies (vector, lexical, symbol, graph) are adapters; the core only
//! fuses their ranked hits. The fan-out runs them concurrently and cancels
//! on deadline — a slow strategy degrades to an empty contribution.

use crate::features::graph_store::GraphStore;
use crate::shared::models::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// One ranked hit from a single strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SearchHit {
    pub fn new(chunk_id: impl Into<String>, score: f32) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            score,
            file_path: None,
            symbol_id: None,
            metadata: HashMap::new(),
        }
    }
}

#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Strategy key used for weighting: `vector`, `lexical`, `symbol`, `graph`.
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Bounded parallel fan-out over the registered strategies.
pub struct StrategyFanout {
    strategies: Vec<Arc<dyn SearchStrategy>>,
    deadline: Duration,
}

impl StrategyFanout {
    pub fn new(strategies: Vec<Arc<dyn SearchStrategy>>, deadline: Duration) -> Self {
        Self {
            strategies,
            deadline,
        }
    }

    /// Run every strategy concurrently. A strategy that errors or misses the
    /// deadline contributes nothing (logged, not fatal).
    pub async fn gather(&self, query: &str, limit: usize) -> HashMap<String, Vec<SearchHit>> {
        let mut handles = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let strategy = Arc::clone(strategy);
            let query = query.to_string();
            let deadline = self.deadline;
            handles.push(tokio::spawn(async move {
                let name = strategy.name();
                match tokio::time::timeout(deadline, strategy.search(&query, limit)).await {
                    Ok(Ok(hits)) => (name, hits),
                    Ok(Err(e)) => {
                        warn!(strategy = name, error = %e, "strategy failed");
                        (name, Vec::new())
                    }
                    Err(_) => {
                        warn!(strategy = name, "strategy missed deadline");
                        (name, Vec::new())
                    }
                }
            }));
        }

        let mut out = HashMap::new();
        for handle in handles {
            if let Ok((name, hits)) = handle.await {
                if !hits.is_empty() {
                    out.insert(name.to_string(), hits);
                }
            }
        }
        out
    }
}

/// In-core symbol strategy: exact and substring matches over the snapshot's
/// symbol names and fqns.
pub struct SymbolStrategy {
    entries: Vec<SymbolEntry>,
}

struct SymbolEntry {
    name: String,
    fqn: String,
    node_id: String,
    file_path: String,
}

impl SymbolStrategy {
    pub fn from_store(store: &GraphStore) -> Self {
        let mut entries: Vec<SymbolEntry> = store
            .iter_nodes()
            .filter(|(_, n)| n.kind.is_symbol() && !n.is_external())
            .filter_map(|(_, n)| {
                n.name.as_ref().map(|name| SymbolEntry {
                    name: name.clone(),
                    fqn: n.fqn.clone(),
                    node_id: n.id.clone(),
                    file_path: n.file_path.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.fqn.cmp(&b.fqn));
        Self { entries }
    }
}

#[async_trait]
impl SearchStrategy for SymbolStrategy {
    fn name(&self) -> &'static str {
        "symbol"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let needle = query.trim().to_lowercase();
        let mut scored: Vec<(f32, &SymbolEntry)> = self
            .entries
            .iter()
            .filter_map(|e| {
                let name = e.name.to_lowercase();
                let fqn = e.fqn.to_lowercase();
                let score = if name == needle || fqn == needle {
                    1.0
                } else if name.contains(&needle) || fqn.contains(&needle) {
                    0.5
                } else {
                    return None;
                };
                Some((score, e))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.fqn.cmp(&b.1.fqn)));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, e)| {
                let mut hit = SearchHit::new(e.node_id.clone(), score);
                hit.file_path = Some(e.file_path.clone());
                hit.symbol_id = Some(e.node_id.clone());
                hit
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_generation::StructuralIrBuilder;
    use crate::features::parsing::{Parser, PythonParser};
    use crate::shared::models::CodeatlasError;

    struct CannedStrategy {
        name: &'static str,
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl SearchStrategy for CannedStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            Ok(self.hits.clone())
        }
    }

    struct FailingStrategy;

    #[async_trait]
    impl SearchStrategy for FailingStrategy {
        fn name(&self) -> &'static str {
            "lexical"
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>> {
            Err(CodeatlasError::new(
                crate::shared::models::ErrorKind::Retrieval,
                "backend down",
            ))
        }
    }

    #[tokio::test]
    async fn test_fanout_collects_and_degrades() {
        let fanout = StrategyFanout::new(
            vec![
                Arc::new(CannedStrategy {
                    name: "vector",
                    hits: vec![SearchHit::new("a", 0.9)],
                }),
                Arc::new(FailingStrategy),
            ],
            Duration::from_secs(1),
        );

        let hits = fanout.gather("query", 10).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits["vector"].len(), 1);
    }

    #[tokio::test]
    async fn test_symbol_strategy_over_store() {
        let parsed = PythonParser::new()
            .parse("app.py", "def handle_request():\n    pass\n\ndef other():\n    pass\n")
            .unwrap();
        let doc = StructuralIrBuilder::new("r", &parsed).build(&parsed).unwrap();
        let store = GraphStore::build("snap", vec![doc]).unwrap();

        let strategy = SymbolStrategy::from_store(&store);
        let hits = strategy.search("handle_request", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].symbol_id.as_ref().unwrap().contains("handle_request"));
    }
}
