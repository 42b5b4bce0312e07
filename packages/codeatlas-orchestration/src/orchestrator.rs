//! Pipeline driver: discovery → per-file layers → cross-file → impact →
//! taint → graph build, with incremental scheduling and atomic version
//! promotion.
//!
//! Per-file errors stay on the layer summary; consistency errors abort the
//! session; a cancelled build drops in-memory state and leaves the last
//! promoted version untouched.

use crate::discovery::{self, SourceFile};
use crate::result::{IndexingResult, LayerSummary};
use crate::session::BuildSession;
use codeatlas_ir::features::cross_file::{CrossFileResolver, DependencyGraph, GlobalContext};
use codeatlas_ir::features::parsing::Parser;
use codeatlas_ir::features::taint_analysis::{RuleSet, TaintEngine};
use codeatlas_ir::features::type_enrichment::TypeEnricher;
use codeatlas_ir::shared::models::{CodeatlasError, ContentHash, Finding};
use codeatlas_ir::{FileProcessor, GraphStore, IRDocument, PipelineConfig, ProcessOutcome, Result};
use codeatlas_storage::{cache_key, FindingsStore, IrCache, IndexVersion, VersionStatus, VersionStore};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Clone)]
pub struct OrchestratorConfig {
    pub pipeline: PipelineConfig,
    pub excludes: Vec<String>,
    /// Impact-walk budget: exceeding it escalates to a full rebuild.
    pub max_impact_reindex_files: usize,
    /// Progress callback cadence, in files.
    pub progress_interval: usize,
    /// Bounded input queue for the worker pool: at most this many files are
    /// in flight per batch, keeping memory flat on huge repositories.
    pub batch_size: usize,
    /// Soft per-layer timeout; exceeding it logs, never fails.
    pub soft_stage_timeout_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            excludes: discovery::default_excludes(),
            max_impact_reindex_files: 500,
            progress_interval: 50,
            batch_size: 256,
            soft_stage_timeout_ms: 120_000,
        }
    }
}

/// Everything a completed build hands to the serving layer.
#[derive(Debug)]
pub struct BuildArtifacts {
    pub result: IndexingResult,
    pub graph: GraphStore,
    pub findings: Vec<Finding>,
}

struct LoadedFile {
    file: SourceFile,
    source: String,
    hash: String,
    changed: bool,
}

pub struct Orchestrator {
    processor: FileProcessor,
    cache: Arc<IrCache>,
    versions: Arc<VersionStore>,
    findings_store: Option<Arc<FindingsStore>>,
    rules: Option<Arc<RuleSet>>,
    enricher: Option<Arc<TypeEnricher>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        parser: Arc<dyn Parser>,
        cache: Arc<IrCache>,
        versions: Arc<VersionStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let processor = FileProcessor::new(parser, config.pipeline.clone());
        Self {
            processor,
            cache,
            versions,
            findings_store: None,
            rules: None,
            enricher: None,
            config,
        }
    }

    pub fn with_taint(
        mut self,
        rules: Arc<RuleSet>,
        findings_store: Arc<FindingsStore>,
    ) -> Self {
        self.rules = Some(rules);
        self.findings_store = Some(findings_store);
        self
    }

    /// Attach a language-server-backed type enricher. Absence (or a dying
    /// server) degrades to structural types only.
    pub fn with_enrichment(mut self, enricher: Arc<TypeEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Run one build. Cancellation surfaces as an error of kind `Cancelled`;
    /// callers must not treat it as a failure.
    pub fn build(&self, session: &BuildSession) -> Result<BuildArtifacts> {
        let run_start = Instant::now();
        let mut durations: BTreeMap<String, u64> = BTreeMap::new();
        let mut summaries: BTreeMap<String, LayerSummary> = BTreeMap::new();

        if session.repo_id.is_empty() {
            return Err(CodeatlasError::validation("repo_id must not be empty"));
        }
        if !session.repo_path.is_dir() {
            return Err(CodeatlasError::validation(format!(
                "repository path {} is not a readable directory",
                session.repo_path.display()
            )));
        }

        // ── discovery ─────────────────────────────────────────────
        let stage = Instant::now();
        let files = discovery::discover(&session.repo_path, &self.config.excludes);
        self.note_stage(&mut durations, "discovery", stage);
        self.check_stop(session)?;

        let previous = if session.is_incremental {
            self.versions.current()
        } else {
            None
        };

        // ── load + change detection ───────────────────────────────
        let stage = Instant::now();
        let mut discovery_summary = LayerSummary::default();
        let loaded = self.load_files(&files, previous.as_ref(), &mut discovery_summary);
        let load_failed = discovery_summary.files_failed;
        self.note_stage(&mut durations, "load", stage);
        summaries.insert("load".to_string(), discovery_summary);
        self.check_stop(session)?;

        let changed_paths: Vec<String> = loaded
            .iter()
            .filter(|f| f.changed)
            .map(|f| f.file.rel_path.clone())
            .collect();
        info!(
            total = loaded.len(),
            changed = changed_paths.len(),
            incremental = session.is_incremental,
            "change set computed"
        );

        // ── structural / semantic per-file layers ─────────────────
        let stage = Instant::now();
        let mut structural = LayerSummary::default();
        let mut docs =
            self.run_per_file_layer(session, &loaded, None, &mut structural)?;
        let files_processed = structural.files_processed;
        self.note_stage(&mut durations, "structural", stage);
        self.check_stop(session)?;

        // ── type enrichment (I/O-bound, cooperative) ──────────────
        if let Some(enricher) = &self.enricher {
            let stage = Instant::now();
            let sources: BTreeMap<&str, &str> = loaded
                .iter()
                .map(|f| (f.file.rel_path.as_str(), f.source.as_str()))
                .collect();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .map_err(|e| CodeatlasError::internal(format!("tokio runtime: {}", e)))?;
            runtime.block_on(async {
                for doc in docs.iter_mut() {
                    if session.stop_event.is_stopped() {
                        break;
                    }
                    if let Some(source) = sources.get(doc.file_path.as_str()) {
                        let summary = enricher.enrich_document(doc, source).await;
                        if summary.degraded {
                            break;
                        }
                    }
                }
            });
            self.note_stage(&mut durations, "enrich", stage);
            self.check_stop(session)?;
        }

        // ── cross-file resolution ─────────────────────────────────
        let stage = Instant::now();
        let ctx = GlobalContext::build(&docs);
        CrossFileResolver::new(&ctx).resolve_all(&mut docs);
        self.note_stage(&mut durations, "cross_file", stage);
        self.check_stop(session)?;

        // ── transitive impact re-enrichment ───────────────────────
        if session.is_incremental && !changed_paths.is_empty() {
            let stage = Instant::now();
            let mut impact_summary = LayerSummary::default();
            let dep_graph = DependencyGraph::build(&ctx);
            let impact = dep_graph.impact(&changed_paths, self.config.max_impact_reindex_files);

            if impact.escalate_full_rebuild {
                warn!(
                    budget = self.config.max_impact_reindex_files,
                    "impact budget exceeded, escalating to full rebuild"
                );
                docs = self.run_per_file_layer(session, &loaded, Some(&AllFiles), &mut impact_summary)?;
                let ctx = GlobalContext::build(&docs);
                CrossFileResolver::new(&ctx).resolve_all(&mut docs);
            } else {
                let affected_unchanged: HashSet<String> = impact
                    .affected
                    .iter()
                    .filter(|p| !changed_paths.contains(p))
                    .cloned()
                    .collect();
                if !affected_unchanged.is_empty() {
                    docs = self.run_per_file_layer(
                        session,
                        &loaded,
                        Some(&affected_unchanged),
                        &mut impact_summary,
                    )?;
                    let ctx = GlobalContext::build(&docs);
                    CrossFileResolver::new(&ctx).resolve_all(&mut docs);
                }
            }
            self.note_stage(&mut durations, "impact", stage);
            summaries.insert("impact".to_string(), impact_summary);
            self.check_stop(session)?;
        }

        // ── taint ─────────────────────────────────────────────────
        let mut findings: Vec<Finding> = Vec::new();
        if let Some(rules) = &self.rules {
            let stage = Instant::now();
            let engine = TaintEngine::new_shared(Arc::clone(rules));
            for doc in &docs {
                findings.extend(engine.analyze(doc));
                if session.stop_event.is_stopped() {
                    return Err(CodeatlasError::cancelled());
                }
            }
            if let Some(store) = &self.findings_store {
                store
                    .save(&session.snapshot_id, &findings)
                    .map_err(|e| CodeatlasError::storage(e.to_string()))?;
            }
            self.note_stage(&mut durations, "taint", stage);
        }

        // ── graph build ───────────────────────────────────────────
        let stage = Instant::now();
        let files_map: BTreeMap<String, String> = loaded
            .iter()
            .map(|f| (f.file.rel_path.clone(), f.hash.clone()))
            .collect();
        let files_total = loaded.len();
        let files_failed = structural.files_failed + load_failed;
        let files_skipped = structural.warnings.len();
        let files_cached = files_total
            .saturating_sub(files_processed)
            .saturating_sub(structural.files_failed)
            .saturating_sub(files_skipped);
        summaries.insert("structural".to_string(), structural);

        let graph = GraphStore::build(session.snapshot_id.clone(), docs)?;
        self.note_stage(&mut durations, "graph", stage);
        self.check_stop(session)?;

        // ── version record + atomic promotion ─────────────────────
        let mut version = IndexVersion::begin(&session.repo_id);
        version.file_count = files_total;
        version.files = files_map;
        version.status = VersionStatus::Completed;
        version.duration_ms = run_start.elapsed().as_millis() as u64;
        self.versions
            .save(&version)
            .map_err(|e| CodeatlasError::storage(e.to_string()))?;
        self.versions
            .promote(&version.version_id)
            .map_err(|e| CodeatlasError::storage(e.to_string()))?;

        let result = IndexingResult {
            status: IndexingResult::status_from_counts(files_failed),
            version_id: version.version_id,
            snapshot_id: session.snapshot_id.clone(),
            files_total,
            files_processed,
            files_cached,
            files_failed,
            files_skipped,
            stage_durations_ms: durations,
            stage_summaries: summaries,
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            findings_count: findings.len(),
        };

        info!(
            version = %result.version_id,
            status = ?result.status,
            files = result.files_total,
            processed = result.files_processed,
            "indexing complete"
        );

        Ok(BuildArtifacts {
            result,
            graph,
            findings,
        })
    }

    fn check_stop(&self, session: &BuildSession) -> Result<()> {
        if session.stop_event.is_stopped() {
            Err(CodeatlasError::cancelled())
        } else {
            Ok(())
        }
    }

    fn load_files(
        &self,
        files: &[SourceFile],
        previous: Option<&IndexVersion>,
        summary: &mut LayerSummary,
    ) -> Vec<LoadedFile> {
        let mut loaded = Vec::with_capacity(files.len());
        for file in files {
            let source = match std::fs::read_to_string(&file.abs_path) {
                Ok(s) => s,
                Err(e) => {
                    summary.files_failed += 1;
                    summary
                        .errors
                        .push(format!("{}: unreadable ({})", file.rel_path, e));
                    continue;
                }
            };
            let hash = ContentHash::of_file(source.as_bytes()).to_hex();
            let changed = previous
                .map(|prev| prev.files.get(&file.rel_path) != Some(&hash))
                .unwrap_or(true);
            loaded.push(LoadedFile {
                file: file.clone(),
                source,
                hash,
                changed,
            });
        }
        loaded
    }

    /// Run the per-file pipeline. Unchanged files pull from the cache;
    /// changed (or force-listed) files recompute and refresh their entry.
    fn run_per_file_layer(
        &self,
        session: &BuildSession,
        loaded: &[LoadedFile],
        force: Option<&dyn RecomputeSet>,
        summary: &mut LayerSummary,
    ) -> Result<Vec<IRDocument>> {
        let repo_id = session.repo_id.as_str();
        let total = loaded.len();

        let mut docs = Vec::with_capacity(total);
        let mut processed = 0usize;
        let mut done = 0usize;

        // Bounded fan-out: one batch in flight at a time. Discovery output
        // beyond the batch waits here instead of ballooning in memory.
        for batch in loaded.chunks(self.config.batch_size.max(1)) {
            self.check_stop(session)?;

            let outcomes: Vec<FileOutcome> = batch
                .par_iter()
                .map(|file| {
                    if session.stop_event.is_stopped() {
                        return FileOutcome::Cancelled;
                    }

                    let key = cache_key(&file.file.rel_path, &file.hash);
                    // The impact pass re-reads changed files from their fresh
                    // cache entries; only the forced set recomputes.
                    let recompute = match force {
                        Some(set) => set.contains(&file.file.rel_path),
                        None => file.changed,
                    };

                    if !recompute {
                        if let Some(doc) = self.cache.get(&key) {
                            return FileOutcome::Cached(doc.as_ref().clone());
                        }
                    }

                    match self
                        .processor
                        .process(repo_id, &file.file.rel_path, &file.source)
                    {
                        Ok(ProcessOutcome::Processed(doc)) => {
                            let doc = *doc;
                            let _ = self.cache.put(&key, Arc::new(doc.clone()));
                            FileOutcome::Processed(doc)
                        }
                        Ok(ProcessOutcome::Skipped { reason }) => {
                            FileOutcome::Skipped(format!("{}: {}", file.file.rel_path, reason))
                        }
                        Err(e) if e.kind == codeatlas_ir::ErrorKind::Consistency => {
                            FileOutcome::Fatal(e)
                        }
                        Err(e) => FileOutcome::Failed(format!("{}: {}", file.file.rel_path, e)),
                    }
                })
                .collect();

            for outcome in outcomes {
                match outcome {
                    FileOutcome::Cached(doc) => docs.push(doc),
                    FileOutcome::Processed(doc) => {
                        processed += 1;
                        docs.push(doc);
                    }
                    FileOutcome::Skipped(reason) => {
                        warn!(%reason, "file skipped");
                        summary.warnings.push(reason);
                    }
                    FileOutcome::Failed(message) => {
                        summary.files_failed += 1;
                        summary.errors.push(message);
                    }
                    FileOutcome::Fatal(e) => return Err(e),
                    FileOutcome::Cancelled => return Err(CodeatlasError::cancelled()),
                }
                done += 1;
                if done % self.config.progress_interval == 0 || done == total {
                    session.update_progress("structural", done, total);
                }
            }
        }
        summary.files_processed = processed;
        Ok(docs)
    }

    /// Soft per-layer timeout: log and continue.
    fn note_stage(&self, durations: &mut BTreeMap<String, u64>, stage: &str, started: Instant) {
        let elapsed = started.elapsed().as_millis() as u64;
        if elapsed > self.config.soft_stage_timeout_ms {
            warn!(stage, elapsed_ms = elapsed, "stage exceeded soft timeout");
        }
        durations.insert(stage.to_string(), elapsed);
    }
}

enum FileOutcome {
    Cached(IRDocument),
    Processed(IRDocument),
    Skipped(String),
    Failed(String),
    Fatal(CodeatlasError),
    Cancelled,
}

/// Membership test for the forced-recompute set.
trait RecomputeSet: Sync {
    fn contains(&self, path: &str) -> bool;
}

impl RecomputeSet for HashSet<String> {
    fn contains(&self, path: &str) -> bool {
        HashSet::contains(self, path)
    }
}

struct AllFiles;

impl RecomputeSet for AllFiles {
    fn contains(&self, _path: &str) -> bool {
        true
    }
}

/// Convenience: default orchestrator over the reference Python parser.
pub fn default_orchestrator(
    cache_dir: Option<&Path>,
    state_dir: &Path,
    config: OrchestratorConfig,
) -> Result<Orchestrator> {
    use codeatlas_ir::features::parsing::PythonParser;
    use codeatlas_storage::CacheConfig;

    let cache = IrCache::new(CacheConfig {
        memory_capacity: 4096,
        cache_dir: cache_dir.map(Path::to_path_buf),
    })
    .map_err(|e| CodeatlasError::storage(e.to_string()))?;
    let versions =
        VersionStore::new(state_dir).map_err(|e| CodeatlasError::storage(e.to_string()))?;

    Ok(Orchestrator::new(
        Arc::new(PythonParser::new()),
        Arc::new(cache),
        Arc::new(versions),
        config,
    ))
}
