//! Type enricher: attach language-server-resolved types to nodes whose
//! declared type could not be inferred structurally.
//!
//! Degrades gracefully — a missing or dying LSP is a warning, never a
//! failure; nodes keep whatever type they already had.

use super::ports::{LspPort, LspState};
use crate::shared::models::{IRDocument, NodeKind};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct EnricherConfig {
    /// Hard timeout for all queries against one file.
    pub per_file_timeout: Duration,
    /// Hard timeout for a single hover/definition call.
    pub per_call_timeout: Duration,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            per_file_timeout: Duration::from_secs(10),
            per_call_timeout: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichSummary {
    pub nodes_queried: usize,
    pub nodes_enriched: usize,
    pub cache_hits: usize,
    pub warnings: usize,
    /// True when the client died and the remaining files were skipped.
    pub degraded: bool,
}

type PositionKey = (String, u32, u32);

pub struct TypeEnricher {
    port: Arc<dyn LspPort>,
    config: EnricherConfig,
    state: Mutex<LspState>,
    /// Per-node result cache keyed by (file content hash, line, col).
    cache: DashMap<PositionKey, Option<String>, ahash::RandomState>,
    /// Files announced with didOpen this session.
    opened: DashMap<String, (), ahash::RandomState>,
}

impl TypeEnricher {
    pub fn new(port: Arc<dyn LspPort>, config: EnricherConfig) -> Self {
        Self {
            port,
            config,
            state: Mutex::new(LspState::Unstarted),
            cache: DashMap::with_hasher(ahash::RandomState::new()),
            opened: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    pub fn state(&self) -> LspState {
        *self.state.lock()
    }

    /// Drive `Unstarted → Starting → Initialized → Active`. Returns false if
    /// the client is (or just became) stopped.
    async fn ensure_active(&self) -> bool {
        let current = *self.state.lock();
        match current {
            LspState::Active => return true,
            LspState::Stopped | LspState::Draining => return false,
            _ => {}
        }

        *self.state.lock() = LspState::Starting;
        match self.port.initialize().await {
            Ok(()) => {
                let mut state = self.state.lock();
                *state = LspState::Initialized;
                *state = LspState::Active;
                true
            }
            Err(e) => {
                warn!(error = %e, "lsp initialize failed; continuing without enrichment");
                *self.state.lock() = LspState::Stopped;
                false
            }
        }
    }

    fn force_stopped(&self) {
        *self.state.lock() = LspState::Stopped;
    }

    /// Enrich one document in place. Queries are batched per file behind a
    /// single didOpen; every result lands in `attrs["lsp_type"]`.
    pub async fn enrich_document(&self, doc: &mut IRDocument, source: &str) -> EnrichSummary {
        let mut summary = EnrichSummary::default();

        if !self.ensure_active().await {
            summary.degraded = true;
            return summary;
        }

        let file_hash = doc
            .content_hash
            .map(|h| h.to_hex())
            .unwrap_or_else(|| doc.file_path.clone());

        // Lazy didOpen, once per file per session.
        if self.opened.insert(doc.file_path.clone(), ()).is_none() {
            if let Err(e) = self.port.did_open(&doc.file_path, source).await {
                warn!(file = %doc.file_path, error = %e, "didOpen failed; lsp stopped");
                self.force_stopped();
                summary.degraded = true;
                return summary;
            }
        }

        let positions: Vec<(usize, u32, u32)> = doc
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| {
                n.declared_type_id.is_none()
                    && n.attrs.get("lsp_type").is_none()
                    && matches!(
                        n.kind,
                        NodeKind::Variable | NodeKind::Field | NodeKind::Parameter
                    )
            })
            .map(|(i, n)| (i, n.span.start_line, n.span.start_col))
            .collect();

        let file_path = doc.file_path.clone();
        let batch = async {
            for (idx, line, col) in positions {
                summary.nodes_queried += 1;
                let key = (file_hash.clone(), line, col);

                let resolved = if let Some(cached) = self.cache.get(&key) {
                    summary.cache_hits += 1;
                    cached.clone()
                } else {
                    let call = tokio::time::timeout(
                        self.config.per_call_timeout,
                        self.port.hover(&file_path, line, col),
                    );
                    match call.await {
                        Ok(Ok(hover)) => {
                            self.cache.insert(key, hover.clone());
                            hover
                        }
                        Ok(Err(e)) => {
                            // Transport error: stop the client, keep pre-LSP types.
                            warn!(file = %file_path, error = %e, "lsp transport error");
                            self.force_stopped();
                            summary.degraded = true;
                            return;
                        }
                        Err(_) => {
                            // Per-call timeout is fail-open: skip this node.
                            debug!(file = %file_path, line, col, "lsp hover timed out");
                            summary.warnings += 1;
                            continue;
                        }
                    }
                };

                if let Some(type_text) = resolved {
                    doc.nodes[idx]
                        .attrs
                        .insert("lsp_type".to_string(), serde_json::Value::String(type_text));
                    summary.nodes_enriched += 1;
                }
            }
        };

        if tokio::time::timeout(self.config.per_file_timeout, batch)
            .await
            .is_err()
        {
            warn!(file = %doc.file_path, "per-file enrichment timeout");
            summary.warnings += 1;
        }

        summary
    }

    /// Graceful shutdown: `Active → Draining → Stopped`.
    pub async fn shutdown(&self) {
        let current = *self.state.lock();
        if current != LspState::Active {
            *self.state.lock() = LspState::Stopped;
            return;
        }
        *self.state.lock() = LspState::Draining;
        if let Err(e) = self.port.shutdown().await {
            debug!(error = %e, "lsp shutdown error ignored");
        }
        *self.state.lock() = LspState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_generation::StructuralIrBuilder;
    use crate::features::parsing::{Parser, PythonParser};
    use crate::shared::models::{CodeatlasError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockLsp {
        hover_calls: AtomicUsize,
        fail_transport: bool,
    }

    impl MockLsp {
        fn new(fail_transport: bool) -> Self {
            Self {
                hover_calls: AtomicUsize::new(0),
                fail_transport,
            }
        }
    }

    #[async_trait]
    impl LspPort for MockLsp {
        async fn initialize(&self) -> Result<()> {
            Ok(())
        }

        async fn did_open(&self, _file_path: &str, _source: &str) -> Result<()> {
            Ok(())
        }

        async fn hover(&self, _file_path: &str, _line: u32, _col: u32) -> Result<Option<String>> {
            self.hover_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_transport {
                return Err(CodeatlasError::type_enrichment("pipe closed"));
            }
            Ok(Some("builtins.int".to_string()))
        }

        async fn definition(&self, _f: &str, _l: u32, _c: u32) -> Result<Option<String>> {
            Ok(None)
        }

        async fn shutdown(&self) -> Result<()> {
            Ok(())
        }
    }

    fn doc_for(source: &str) -> (IRDocument, String) {
        let parsed = PythonParser::new().parse("m.py", source).unwrap();
        let doc = StructuralIrBuilder::new("r", &parsed).build(&parsed).unwrap();
        (doc, source.to_string())
    }

    #[tokio::test]
    async fn test_enrichment_attaches_lsp_type() {
        let (mut doc, source) = doc_for("x = 1\n");
        let port = Arc::new(MockLsp::new(false));
        let enricher = TypeEnricher::new(port.clone(), EnricherConfig::default());

        let summary = enricher.enrich_document(&mut doc, &source).await;
        assert_eq!(summary.nodes_enriched, 1);
        assert!(!summary.degraded);
        assert_eq!(enricher.state(), LspState::Active);

        let var = &doc.nodes_by_kind(NodeKind::Variable)[0];
        assert_eq!(var.attr_str("lsp_type"), Some("builtins.int"));
    }

    #[tokio::test]
    async fn test_per_node_cache_keyed_by_content() {
        let (mut doc, source) = doc_for("x = 1\n");
        let port = Arc::new(MockLsp::new(false));
        let enricher = TypeEnricher::new(port.clone(), EnricherConfig::default());

        enricher.enrich_document(&mut doc, &source).await;
        // Second pass over an identical document hits the cache.
        let (mut doc2, _) = doc_for("x = 1\n");
        let summary = enricher.enrich_document(&mut doc2, &source).await;
        assert_eq!(summary.cache_hits, 1);
        assert_eq!(port.hover_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transport_error_forces_stopped_and_degrades() {
        let (mut doc, source) = doc_for("x = 1\ny = 2\n");
        let enricher = TypeEnricher::new(Arc::new(MockLsp::new(true)), EnricherConfig::default());

        let summary = enricher.enrich_document(&mut doc, &source).await;
        assert!(summary.degraded);
        assert_eq!(enricher.state(), LspState::Stopped);
        assert_eq!(summary.nodes_enriched, 0);

        // Further files are skipped without touching the port.
        let (mut doc2, source2) = doc_for("z = 3\n");
        let summary2 = enricher.enrich_document(&mut doc2, &source2).await;
        assert!(summary2.degraded);
        assert_eq!(summary2.nodes_queried, 0);
    }

    #[tokio::test]
    async fn test_shutdown_transitions() {
        let enricher = TypeEnricher::new(Arc::new(MockLsp::new(false)), EnricherConfig::default());
        assert_eq!(enricher.state(), LspState::Unstarted);
        enricher.ensure_active().await;
        assert_eq!(enricher.state(), LspState::Active);
        enricher.shutdown().await;
        assert_eq!(enricher.state(), LspState::Stopped);
    }
}
