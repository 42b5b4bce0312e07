//! Cross-feature integration: pipeline → cross-file → graph → query →
//! taint → retrieval over a small multi-file corpus.

use codeatlas_ir::features::cross_file::{CrossFileResolver, GlobalContext};
use codeatlas_ir::features::graph_store::GraphStore;
use codeatlas_ir::features::parsing::{Parser, PythonParser};
use codeatlas_ir::features::query_engine::{Q, QueryEngine};
use codeatlas_ir::features::retrieval::{
    IntentProbability, RetrieverConfig, RetrieverService, SearchHit,
};
use codeatlas_ir::features::taint_analysis::{RuleSet, TaintEngine};
use codeatlas_ir::shared::models::{EdgeKind, NodeKind, OccurrenceRole};
use codeatlas_ir::{FileProcessor, IRDocument, PipelineConfig, ProcessOutcome};
use std::collections::HashMap;
use std::sync::Arc;

fn process_files(files: &[(&str, &str)]) -> Vec<IRDocument> {
    let processor = FileProcessor::new(Arc::new(PythonParser::new()), PipelineConfig::default());
    let mut docs: Vec<IRDocument> = files
        .iter()
        .map(|(path, source)| {
            match processor.process("repo", path, source).unwrap() {
                ProcessOutcome::Processed(doc) => *doc,
                ProcessOutcome::Skipped { reason } => panic!("skipped {}: {}", path, reason),
            }
        })
        .collect();

    let ctx = GlobalContext::build(&docs);
    CrossFileResolver::new(&ctx).resolve_all(&mut docs);
    docs
}

#[test]
fn test_find_references_across_pipeline() {
    let docs = process_files(&[(
        "mod.py",
        "\ndef foo():\n    pass\n\nfoo()\nfoo()\n",
    )]);

    let occs: Vec<_> = docs[0]
        .occurrences
        .iter()
        .filter(|o| o.symbol_fqn == "mod.foo")
        .collect();
    assert_eq!(occs.len(), 3);
    assert_eq!(occs[0].role, OccurrenceRole::Def);
    assert_eq!(occs[0].span.start_line, 2);
    assert_eq!(occs[1].span.start_line, 5);
    assert_eq!(occs[2].span.start_line, 6);
}

#[test]
fn test_cross_file_call_graph_query() {
    let docs = process_files(&[
        ("lib.py", "def target():\n    return 1\n"),
        (
            "caller.py",
            "from lib import target\n\ndef entry():\n    return target()\n",
        ),
    ]);

    let store = GraphStore::build("snap", docs).unwrap();
    let query = (Q::func("entry") >> Q::func("target"))
        .any_path()
        .via(EdgeKind::Calls)
        .depth(2);
    let result = QueryEngine::new(&store).execute(&query);
    assert_eq!(result.paths.len(), 1);
    assert!(result.complete);
}

#[test]
fn test_taint_finding_through_full_pipeline() {
    let rules = RuleSet::from_yaml(
        r#"
atoms:
  sources:
    - id: flask-request-args
      method: get
      base_type: request.args
  sinks:
    - id: sqlite-execute
      method: execute
      base_type: sqlite3.Cursor
      arg_roles: ["0"]
      kind: SQL_INJECTION
      cwe: CWE-89
"#,
    )
    .unwrap();

    let docs = process_files(&[(
        "handler.py",
        "def handle():\n    q = request.args.get(\"x\")\n    cursor.execute(q)\n",
    )]);

    let findings = TaintEngine::new(rules).analyze(&docs[0]);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].kind, "SQL_INJECTION");
    assert_eq!(findings[0].cwe.as_deref(), Some("CWE-89"));
}

#[test]
fn test_retrieval_over_graph_symbols() {
    let docs = process_files(&[(
        "svc.py",
        "def fetch_user():\n    pass\n\ndef store_user():\n    pass\n",
    )]);
    let store = GraphStore::build("snap", docs).unwrap();

    // Symbol hits fed into fusion alongside a canned lexical ranking.
    let symbol_hits: Vec<SearchHit> = store
        .get_nodes_by_kind(NodeKind::Function)
        .iter()
        .enumerate()
        .map(|(i, n)| SearchHit::new(n.id.clone(), 1.0 - i as f32 * 0.1))
        .collect();
    let mut hits = HashMap::new();
    hits.insert("symbol".to_string(), symbol_hits.clone());
    hits.insert("lexical".to_string(), symbol_hits);

    let service = RetrieverService::new(RetrieverConfig::default());
    let (results, intent) =
        service.retrieve("repo", "snap", "definition of fetch_user", &hits, None);

    assert!(!results.is_empty());
    assert_eq!(results[0].num_strategies, 2);
    let expected: IntentProbability = intent;
    assert!(expected.symbol > expected.flow);
}

#[test]
fn test_empty_and_single_declaration_boundaries() {
    let docs = process_files(&[
        ("empty.py", ""),
        ("single.py", "def only():\n    pass\n"),
    ]);

    assert_eq!(docs[0].nodes.len(), 1);
    assert_eq!(docs[0].nodes[0].kind, NodeKind::File);
    assert!(docs[0].edges.is_empty());
    assert!(docs[0].cfg_blocks.is_empty());

    let contains = docs[1]
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Contains)
        .count();
    assert_eq!(contains, 1);
    // A bare declaration produces no data flow.
    assert!(docs[1].dfg_edges.is_empty());
}
