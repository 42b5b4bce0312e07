//! Serialized graph store for warm starts.
//!
//! Layout: `<state_dir>/graph/<snapshot_id>.bin`, msgpack over the raw
//! node/edge payloads. Indexes and CSR layout are rebuilt on load.

use crate::error::{Result, StorageError};
use codeatlas_ir::shared::models::{Edge, Node};
use codeatlas_ir::GraphStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize)]
struct GraphParts {
    snapshot_id: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

pub struct GraphSnapshotStore {
    graph_dir: PathBuf,
}

impl GraphSnapshotStore {
    pub fn new(state_dir: &Path) -> Result<Self> {
        let graph_dir = state_dir.join("graph");
        fs::create_dir_all(&graph_dir)?;
        Ok(Self { graph_dir })
    }

    fn path_for(&self, snapshot_id: &str) -> PathBuf {
        self.graph_dir.join(format!("{}.bin", snapshot_id))
    }

    pub fn save(&self, store: &GraphStore) -> Result<()> {
        let (nodes, edges) = store.parts();
        let parts = GraphParts {
            snapshot_id: store.snapshot_id().to_string(),
            nodes: nodes.to_vec(),
            edges: edges.to_vec(),
        };
        let bytes =
            rmp_serde::to_vec_named(&parts).map_err(|e| StorageError::Encode(e.to_string()))?;
        crate::ir_cache::write_atomically(&self.path_for(&parts.snapshot_id), &bytes, 0)?;
        Ok(())
    }

    /// Load a warm-start snapshot. Missing or corrupt files read as `None`;
    /// the caller rebuilds from source instead.
    pub fn load(&self, snapshot_id: &str) -> Option<GraphStore> {
        let bytes = fs::read(self.path_for(snapshot_id)).ok()?;
        let parts: GraphParts = rmp_serde::from_slice(&bytes).ok()?;
        GraphStore::from_parts(parts.snapshot_id, parts.nodes, parts.edges).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeatlas_ir::features::parsing::{Parser, PythonParser};
    use codeatlas_ir::{FileProcessor, PipelineConfig, ProcessOutcome};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn build_store() -> GraphStore {
        let processor =
            FileProcessor::new(Arc::new(PythonParser::new()), PipelineConfig::default());
        let doc = match processor
            .process("repo", "a.py", "def foo():\n    pass\n\nfoo()\n")
            .unwrap()
        {
            ProcessOutcome::Processed(doc) => *doc,
            ProcessOutcome::Skipped { .. } => unreachable!(),
        };
        GraphStore::build("snap-w", vec![doc]).unwrap()
    }

    #[test]
    fn test_warm_start_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = GraphSnapshotStore::new(dir.path()).unwrap();

        let graph = build_store();
        store.save(&graph).unwrap();

        let restored = store.load("snap-w").unwrap();
        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.edge_count(), graph.edge_count());

        // Lookups behave identically after the round trip.
        let foo = restored
            .get_nodes_by_kind(codeatlas_ir::shared::models::NodeKind::Function)
            .into_iter()
            .find(|n| n.name.as_deref() == Some("foo"))
            .unwrap();
        assert!(!restored.get_edges_by_target(&foo.id).is_empty());
    }

    #[test]
    fn test_missing_or_corrupt_snapshot_is_none() {
        let dir = TempDir::new().unwrap();
        let store = GraphSnapshotStore::new(dir.path()).unwrap();
        assert!(store.load("ghost").is_none());

        fs::write(dir.path().join("graph/bad.bin"), b"junk").unwrap();
        assert!(store.load("bad").is_none());
    }
}
