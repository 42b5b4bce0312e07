//! Build session state: identity, cancellation, progress.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Cooperative stop flag, polled at file boundaries. A stopped build drops
/// its in-memory state and leaves the last promoted version untouched;
/// re-running from the same inputs produces the same outputs.
#[derive(Debug, Clone, Default)]
pub struct StopEvent(Arc<AtomicBool>);

impl StopEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobProgress {
    pub total_files: usize,
    pub processed_files: usize,
    pub current_stage: String,
}

pub type ProgressCallback = Arc<dyn Fn(&JobProgress) + Send + Sync>;

/// One indexing run over a repository snapshot.
pub struct BuildSession {
    pub repo_path: PathBuf,
    pub repo_id: String,
    pub snapshot_id: String,
    pub is_incremental: bool,
    pub stop_event: StopEvent,
    progress: Mutex<JobProgress>,
    progress_callback: Option<ProgressCallback>,
}

impl BuildSession {
    pub fn new(repo_path: impl Into<PathBuf>, repo_id: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            repo_id: repo_id.into(),
            snapshot_id: Uuid::new_v4().to_string(),
            is_incremental: false,
            stop_event: StopEvent::new(),
            progress: Mutex::new(JobProgress::default()),
            progress_callback: None,
        }
    }

    pub fn incremental(mut self) -> Self {
        self.is_incremental = true;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn progress(&self) -> JobProgress {
        self.progress.lock().clone()
    }

    pub fn update_progress(&self, stage: &str, processed: usize, total: usize) {
        let snapshot = {
            let mut progress = self.progress.lock();
            progress.current_stage = stage.to_string();
            progress.processed_files = processed;
            progress.total_files = total;
            progress.clone()
        };
        if let Some(callback) = &self.progress_callback {
            callback(&snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_event() {
        let stop = StopEvent::new();
        assert!(!stop.is_stopped());
        let shared = stop.clone();
        shared.stop();
        assert!(stop.is_stopped());
    }

    #[test]
    fn test_progress_callback_fires() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let session = BuildSession::new("/tmp/repo", "repo")
            .with_progress_callback(Arc::new(move |p: &JobProgress| {
                sink.lock().push(p.clone());
            }));

        session.update_progress("parse", 3, 10);
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].processed_files, 3);
        assert_eq!(seen[0].current_stage, "parse");
    }
}
