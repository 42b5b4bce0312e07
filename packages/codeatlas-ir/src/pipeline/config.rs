//! Per-file pipeline configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub enable_cfg: bool,
    pub enable_dfg: bool,
    pub enable_occurrences: bool,
    /// Run the layer-boundary invariant check after the structural build.
    /// A violation is a bug and fails the file (and the session).
    pub validate_invariants: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_cfg: true,
            enable_dfg: true,
            enable_occurrences: true,
            validate_invariants: true,
        }
    }
}
