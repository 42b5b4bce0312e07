//! Indexing results and per-stage summaries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexingStatus {
    Completed,
    /// Completed with `files_failed > 0`.
    Partial,
    Failed,
}

/// Per-layer report, kept per file-failure-locality rule: a file's error
/// stays on its layer summary, it never aborts the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub files_processed: usize,
    pub files_failed: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingResult {
    pub status: IndexingStatus,
    pub version_id: String,
    pub snapshot_id: String,
    pub files_total: usize,
    /// Files recomputed at the structural layer this run.
    pub files_processed: usize,
    pub files_cached: usize,
    pub files_failed: usize,
    pub files_skipped: usize,
    pub stage_durations_ms: BTreeMap<String, u64>,
    pub stage_summaries: BTreeMap<String, LayerSummary>,
    pub node_count: usize,
    pub edge_count: usize,
    pub findings_count: usize,
}

impl IndexingResult {
    pub fn status_from_counts(files_failed: usize) -> IndexingStatus {
        if files_failed > 0 {
            IndexingStatus::Partial
        } else {
            IndexingStatus::Completed
        }
    }
}
