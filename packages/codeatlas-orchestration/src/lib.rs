//! codeatlas-orchestration: the pipeline driver.
//!
//! Owns one `BuildSession` per run, schedules per-file layers over a rayon
//! pool, pulls unchanged files from the content-addressed cache, and
//! promotes an `IndexVersion` atomically on success.

pub mod discovery;
pub mod orchestrator;
pub mod result;
pub mod session;

pub use discovery::{default_excludes, discover, SourceFile};
pub use orchestrator::{default_orchestrator, BuildArtifacts, Orchestrator, OrchestratorConfig};
pub use result::{IndexingResult, IndexingStatus, LayerSummary};
pub use session::{BuildSession, JobProgress, ProgressCallback, StopEvent};

/// Install a stderr `tracing` subscriber honouring `RUST_LOG`. Intended for
/// binaries and integration harnesses; calling it twice is a no-op.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
