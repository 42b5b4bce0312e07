//! End-to-end orchestration: full build, incremental rebuild, cancellation.

use codeatlas_ir::features::parsing::PythonParser;
use codeatlas_ir::features::query_engine::{Q, QueryEngine};
use codeatlas_ir::shared::models::NodeKind;
use codeatlas_orchestration::{BuildSession, IndexingStatus, Orchestrator, OrchestratorConfig};
use codeatlas_storage::{CacheConfig, IrCache, VersionStore};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write_repo(dir: &Path) {
    fs::create_dir_all(dir.join("pkg")).unwrap();
    fs::write(
        dir.join("pkg/util.py"),
        "def helper(x):\n    return x\n",
    )
    .unwrap();
    fs::write(
        dir.join("app.py"),
        "from pkg.util import helper\n\ndef main():\n    value = helper(1)\n    return value\n",
    )
    .unwrap();
    fs::write(dir.join("extra.py"), "CONSTANT = 7\n").unwrap();
}

fn orchestrator(state: &TempDir) -> Orchestrator {
    let cache = IrCache::new(CacheConfig {
        memory_capacity: 64,
        cache_dir: Some(state.path().join("cache")),
    })
    .unwrap();
    let versions = VersionStore::new(state.path()).unwrap();
    Orchestrator::new(
        Arc::new(PythonParser::new()),
        Arc::new(cache),
        Arc::new(versions),
        OrchestratorConfig::default(),
    )
}

#[test]
fn test_full_build_produces_promoted_version() {
    let repo = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_repo(repo.path());

    let orchestrator = orchestrator(&state);
    let session = BuildSession::new(repo.path(), "repo-1");
    let artifacts = orchestrator.build(&session).unwrap();

    assert_eq!(artifacts.result.status, IndexingStatus::Completed);
    assert_eq!(artifacts.result.files_total, 3);
    assert_eq!(artifacts.result.files_processed, 3);
    assert_eq!(artifacts.result.files_failed, 0);
    assert!(artifacts.result.node_count > 0);

    // Cross-file resolution rewired the imported call.
    let helper = artifacts
        .graph
        .get_nodes_by_kind(NodeKind::Function)
        .into_iter()
        .find(|n| n.fqn == "pkg.util.helper")
        .unwrap();
    let incoming = artifacts.graph.get_edges_by_target(&helper.id);
    assert!(incoming
        .iter()
        .any(|e| e.kind == codeatlas_ir::shared::models::EdgeKind::Calls));
}

#[test]
fn test_incremental_single_file_edit() {
    let repo = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_repo(repo.path());

    let orchestrator = orchestrator(&state);

    let first = orchestrator
        .build(&BuildSession::new(repo.path(), "repo-1"))
        .unwrap();
    assert_eq!(first.result.files_processed, 3);

    // Modify exactly one file's body.
    fs::write(repo.path().join("extra.py"), "CONSTANT = 8\n").unwrap();

    let session = BuildSession::new(repo.path(), "repo-1").incremental();
    let second = orchestrator.build(&session).unwrap();

    assert_eq!(second.result.status, IndexingStatus::Completed);
    assert_eq!(second.result.files_processed, 1);
    assert_eq!(second.result.files_cached, 2);

    // Node count moves by at most the local delta (here: unchanged).
    let delta = (second.result.node_count as i64 - first.result.node_count as i64).abs();
    assert!(delta <= 2);
}

#[test]
fn test_incremental_no_change_is_all_cache_hits() {
    let repo = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_repo(repo.path());

    let orchestrator = orchestrator(&state);
    let first = orchestrator
        .build(&BuildSession::new(repo.path(), "repo-1"))
        .unwrap();

    let second = orchestrator
        .build(&BuildSession::new(repo.path(), "repo-1").incremental())
        .unwrap();

    assert_eq!(second.result.files_processed, 0);
    assert_eq!(second.result.files_cached, 3);
    assert_eq!(second.result.node_count, first.result.node_count);
    assert_eq!(second.result.edge_count, first.result.edge_count);
}

#[test]
fn test_edit_propagates_through_impact() {
    let repo = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_repo(repo.path());

    let orchestrator = orchestrator(&state);
    orchestrator
        .build(&BuildSession::new(repo.path(), "repo-1"))
        .unwrap();

    // util.py changes; app.py imports it and lands in the impact set.
    fs::write(
        repo.path().join("pkg/util.py"),
        "def helper(x):\n    return x + 1\n",
    )
    .unwrap();

    let artifacts = orchestrator
        .build(&BuildSession::new(repo.path(), "repo-1").incremental())
        .unwrap();

    assert_eq!(artifacts.result.files_processed, 1);
    let impact = artifacts.result.stage_summaries.get("impact").unwrap();
    assert_eq!(impact.files_processed, 1);

    // The call edge still lands on the (new) helper node.
    let helper = artifacts
        .graph
        .get_nodes_by_kind(NodeKind::Function)
        .into_iter()
        .find(|n| n.fqn == "pkg.util.helper")
        .unwrap();
    assert!(!artifacts.graph.get_edges_by_target(&helper.id).is_empty());
}

#[test]
fn test_cancelled_build_leaves_promoted_version() {
    let repo = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_repo(repo.path());

    let cache = IrCache::new(CacheConfig {
        memory_capacity: 64,
        cache_dir: Some(state.path().join("cache")),
    })
    .unwrap();
    let versions = Arc::new(VersionStore::new(state.path()).unwrap());
    let orchestrator = Orchestrator::new(
        Arc::new(PythonParser::new()),
        Arc::new(cache),
        Arc::clone(&versions),
        OrchestratorConfig::default(),
    );

    let good = orchestrator
        .build(&BuildSession::new(repo.path(), "repo-1"))
        .unwrap();

    let session = BuildSession::new(repo.path(), "repo-1").incremental();
    session.stop_event.stop();
    let err = orchestrator.build(&session).unwrap_err();
    assert!(err.is_cancelled());

    // Last promoted version untouched.
    assert_eq!(
        versions.current().unwrap().version_id,
        good.result.version_id
    );
}

#[test]
fn test_query_over_built_graph() {
    let repo = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    write_repo(repo.path());

    let orchestrator = orchestrator(&state);
    let artifacts = orchestrator
        .build(&BuildSession::new(repo.path(), "repo-1"))
        .unwrap();

    // main >> helper over CALLS edges within depth 2.
    let query = (Q::func("main") >> Q::func("helper"))
        .any_path()
        .via(codeatlas_ir::shared::models::EdgeKind::Calls)
        .depth(2);
    let result = QueryEngine::new(&artifacts.graph).execute(&query);
    assert_eq!(result.paths.len(), 1);
    assert!(result.complete);
}

#[test]
fn test_validation_errors_are_fatal_at_start() {
    let state = TempDir::new().unwrap();
    let orchestrator = orchestrator(&state);

    let missing = BuildSession::new("/definitely/not/a/path", "repo-1");
    assert!(orchestrator.build(&missing).is_err());

    let repo = TempDir::new().unwrap();
    let empty_id = BuildSession::new(repo.path(), "");
    assert!(orchestrator.build(&empty_id).is_err());
}
