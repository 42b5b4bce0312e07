/*
 * codeatlas-ir - layered IR engine for code understanding
 *
 * Feature-first layout:
 * - shared/    : common models (Node, Edge, Span, IRDocument)
 * - features/  : vertical slices (parsing → ir → cross-file → cfg/dfg →
 *                taint → graph → query → retrieval)
 * - pipeline/  : per-file layer wiring
 *
 * Data flows forward; later layers never mutate earlier layers.
 */

/// Shared models and constants
pub mod shared;

/// Feature modules (pipeline layers)
pub mod features;

/// Per-file pipeline
pub mod pipeline;

/// Error types
pub mod errors;

pub use errors::{CodeatlasError, ErrorKind, Result};
pub use features::graph_store::GraphStore;
pub use features::query_engine::{AnyPathQuery, PathSet, Q, QueryEngine};
pub use pipeline::{FileProcessor, PipelineConfig, ProcessOutcome};
pub use shared::models::IRDocument;

/// Execute a path query against a snapshot store.
///
/// Budget exhaustion is not an error: the result reports `complete = false`
/// with its truncation reason instead.
pub fn execute_any_path(store: &GraphStore, query: &AnyPathQuery) -> PathSet {
    QueryEngine::new(store).execute(query)
}
