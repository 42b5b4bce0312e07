//! Forward worklist taint propagation over the DFG.
//!
//! Marks every entity reachable from a source, clearing at sanitizers and
//! blocking at barriers. Terminates because the mark set is monotone and
//! bounded by the entity count.

use super::rules::{AtomCategory, RuleSet};
use crate::shared::models::{
    DfgEdge, DfgEdgeKind, DfgVariable, Expression, ExpressionKind, Finding, FlowStep, IRDocument,
};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use tracing::debug;

/// How one entity became tainted.
#[derive(Debug, Clone)]
struct Provenance {
    prev: Option<(String, DfgEdgeKind)>,
    source_expr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallClass {
    Source,
    Sink,
    Sanitizer,
    Barrier,
    Propagator,
    Unknown,
}

struct ClassifiedCall<'d> {
    expr: &'d Expression,
    class: CallClass,
    atom_idx: Option<usize>,
    /// Flattened argument entity ids.
    arg_entities: Vec<String>,
}

pub struct TaintEngine {
    rules: std::sync::Arc<RuleSet>,
}

impl TaintEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: std::sync::Arc::new(rules),
        }
    }

    pub fn new_shared(rules: std::sync::Arc<RuleSet>) -> Self {
        Self { rules }
    }

    pub fn analyze(&self, doc: &IRDocument) -> Vec<Finding> {
        let variables: FxHashMap<&str, &DfgVariable> = doc
            .dfg_variables
            .iter()
            .map(|v| (v.id.as_str(), v))
            .collect();

        // Classify every call expression once.
        let mut sink_atoms: Vec<&super::rules::Atom> = Vec::new();
        let calls: Vec<ClassifiedCall> = doc
            .expressions
            .iter()
            .filter(|e| e.kind == ExpressionKind::Call)
            .map(|expr| {
                let method = expr.attr_str("callee_name").unwrap_or_default();
                let base = expr.attr_str("base");
                let evidence = base.and_then(|b| self.type_evidence(doc, b));
                let (class, atom_idx) = match self.rules.classify(method, base, evidence.as_deref())
                {
                    Some(m) => {
                        let idx = match m.category {
                            AtomCategory::Sink => {
                                sink_atoms.push(m.atom);
                                Some(sink_atoms.len() - 1)
                            }
                            _ => None,
                        };
                        (
                            match m.category {
                                AtomCategory::Source => CallClass::Source,
                                AtomCategory::Sink => CallClass::Sink,
                                AtomCategory::Sanitizer => CallClass::Sanitizer,
                                AtomCategory::Barrier => CallClass::Barrier,
                                AtomCategory::Propagator => CallClass::Propagator,
                            },
                            idx,
                        )
                    }
                    None => (CallClass::Unknown, None),
                };
                ClassifiedCall {
                    expr,
                    class,
                    atom_idx,
                    arg_entities: flatten_arg_entities(expr),
                }
            })
            .collect();

        // Adjacency over DFG edges.
        let mut edges_from: FxHashMap<&str, Vec<&DfgEdge>> = FxHashMap::default();
        for edge in &doc.dfg_edges {
            edges_from.entry(edge.source_id.as_str()).or_default().push(edge);
        }
        // Call expressions consuming an entity as argument.
        let mut calls_by_arg: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
        for (i, call) in calls.iter().enumerate() {
            for arg in &call.arg_entities {
                calls_by_arg.entry(arg.as_str()).or_default().push(i);
            }
        }
        // Sanitizer expressions never carry taint onward.
        let sanitized_exprs: Vec<&str> = calls
            .iter()
            .filter(|c| matches!(c.class, CallClass::Sanitizer | CallClass::Barrier))
            .map(|c| c.expr.id.as_str())
            .collect();

        // Seed and propagate.
        let mut tainted: FxHashMap<String, Provenance> = FxHashMap::default();
        let mut worklist: VecDeque<String> = VecDeque::new();
        for call in calls.iter().filter(|c| c.class == CallClass::Source) {
            tainted.insert(
                call.expr.id.clone(),
                Provenance {
                    prev: None,
                    source_expr: call.expr.id.clone(),
                },
            );
            worklist.push_back(call.expr.id.clone());
        }

        while let Some(id) = worklist.pop_front() {
            let Some(prov) = tainted.get(&id).cloned() else {
                continue;
            };

            // The mark never crosses a sanitizer or barrier result.
            if sanitized_exprs.contains(&id.as_str()) {
                continue;
            }

            if let Some(out) = edges_from.get(id.as_str()) {
                for edge in out {
                    if !tainted.contains_key(&edge.target_id) {
                        tainted.insert(
                            edge.target_id.clone(),
                            Provenance {
                                prev: Some((id.clone(), edge.kind)),
                                source_expr: prov.source_expr.clone(),
                            },
                        );
                        worklist.push_back(edge.target_id.clone());
                    }
                }
            }

            if let Some(consumers) = calls_by_arg.get(id.as_str()) {
                for &call_idx in consumers {
                    let call = &calls[call_idx];
                    match call.class {
                        // Sinks are checked after the fixpoint; sanitizers
                        // and barriers stop the mark here.
                        CallClass::Sink | CallClass::Sanitizer | CallClass::Barrier => {}
                        CallClass::Source => {}
                        CallClass::Propagator | CallClass::Unknown => {
                            if !tainted.contains_key(&call.expr.id) {
                                tainted.insert(
                                    call.expr.id.clone(),
                                    Provenance {
                                        prev: Some((id.clone(), DfgEdgeKind::Arg)),
                                        source_expr: prov.source_expr.clone(),
                                    },
                                );
                                worklist.push_back(call.expr.id.clone());
                            }
                        }
                    }
                }
            }
        }

        // Sanitizer calls observed per function, attached as evidence.
        let mut sanitizers_by_function: FxHashMap<&str, Vec<String>> = FxHashMap::default();
        for call in calls.iter().filter(|c| c.class == CallClass::Sanitizer) {
            sanitizers_by_function
                .entry(call.expr.function_node_id.as_str())
                .or_default()
                .push(call.expr.attr_str("callee").unwrap_or_default().to_string());
        }

        // Emit findings.
        let mut findings: Vec<Finding> = Vec::new();
        for call in calls.iter().filter(|c| c.class == CallClass::Sink) {
            let Some(atom_idx) = call.atom_idx else { continue };
            let atom = sink_atoms[atom_idx];

            let tainted_arg = call
                .arg_entities
                .iter()
                .find(|arg| tainted.contains_key(arg.as_str()));

            let emit_heuristic = tainted_arg.is_none()
                && self.rules.flags.heuristic_eval_sinks
                && atom.arg_roles.is_empty();

            if tainted_arg.is_none() && !emit_heuristic {
                continue;
            }

            let callee_name = call.expr.attr_str("callee_name").unwrap_or("sink");
            let sink_step = FlowStep {
                id: call.expr.id.clone(),
                label: format!("{}@sink", callee_name),
                line: call.expr.span.start_line,
            };

            let (source_step, path) = match tainted_arg {
                Some(arg) => {
                    let chain = reconstruct_chain(arg, &tainted);
                    let source_expr_id = tainted
                        .get(arg.as_str())
                        .map(|p| p.source_expr.clone())
                        .unwrap_or_default();
                    let source_line = doc
                        .expressions
                        .iter()
                        .find(|e| e.id == source_expr_id)
                        .map(|e| e.span.start_line)
                        .unwrap_or(0);

                    let mut steps: Vec<FlowStep> = Vec::new();
                    for (entity, kind) in &chain {
                        if let Some(var) = variables.get(entity.as_str()) {
                            steps.push(FlowStep {
                                id: var.id.clone(),
                                label: format!("{}@{}", var.name, kind.as_str()),
                                line: var.span.start_line,
                            });
                        }
                    }
                    // The sink argument itself
                    if let Some(var) = variables.get(arg.as_str()) {
                        steps.push(FlowStep {
                            id: var.id.clone(),
                            label: format!("{}@arg", var.name),
                            line: call.expr.span.start_line,
                        });
                    }
                    steps.push(sink_step.clone());

                    let source_step = steps
                        .first()
                        .cloned()
                        .unwrap_or_else(|| FlowStep {
                            id: source_expr_id,
                            label: "source".to_string(),
                            line: source_line,
                        });
                    (source_step, steps)
                }
                None => (sink_step.clone(), vec![sink_step.clone()]),
            };

            let finding = Finding {
                rule_id: atom.id.clone(),
                kind: atom.finding_kind(),
                severity: atom.finding_severity(),
                file_path: doc.file_path.clone(),
                source: source_step,
                sink: sink_step,
                sink_line: call.expr.span.start_line,
                path,
                sanitizer_evidence: sanitizers_by_function
                    .get(call.expr.function_node_id.as_str())
                    .cloned()
                    .unwrap_or_default(),
                cwe: atom.cwe.clone(),
            };

            // One finding per (rule, file, sink line).
            if !findings.iter().any(|f| f.address() == finding.address()) {
                findings.push(finding);
            }
        }

        debug!(
            file = %doc.file_path,
            findings = findings.len(),
            tainted = tainted.len(),
            "taint analysis complete"
        );
        findings
    }

    /// Enriched type of a receiver: the lsp-attached or declared type of a
    /// same-file variable with that name.
    fn type_evidence(&self, doc: &IRDocument, base: &str) -> Option<String> {
        if base.contains('.') {
            return None;
        }
        let node = doc
            .nodes
            .iter()
            .find(|n| n.name.as_deref() == Some(base) && !n.is_external())?;
        if let Some(t) = node.attr_str("lsp_type") {
            return Some(t.to_string());
        }
        let type_id = node.declared_type_id.as_ref()?;
        doc.types.iter().find(|t| &t.id == type_id).map(|t| t.repr.clone())
    }
}

/// Taint chain from the source side down to (and including) `entity`,
/// with the edge kind that tainted each hop.
fn reconstruct_chain(
    entity: &str,
    tainted: &FxHashMap<String, Provenance>,
) -> Vec<(String, DfgEdgeKind)> {
    let mut rev: Vec<(String, DfgEdgeKind)> = Vec::new();
    let mut cursor = entity.to_string();
    let mut hops = 0usize;

    while let Some(prov) = tainted.get(&cursor) {
        hops += 1;
        if hops > tainted.len() + 1 {
            break;
        }
        match &prov.prev {
            Some((prev, kind)) => {
                rev.push((cursor.clone(), *kind));
                cursor = prev.clone();
            }
            None => break,
        }
    }

    rev.reverse();
    rev
}

fn flatten_arg_entities(expr: &Expression) -> Vec<String> {
    expr.attrs
        .get("arg_entities")
        .and_then(|v| v.as_array())
        .map(|args| {
            args.iter()
                .filter_map(|per_arg| per_arg.as_array())
                .flatten()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::data_flow::DfgBuilder;
    use crate::features::ir_generation::StructuralIrBuilder;
    use crate::features::parsing::{Parser, PythonParser};
    use crate::shared::models::compare_findings;

    const RULES: &str = r#"
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
      cwe: CWE-89
      kind: SQL_INJECTION
  sanitizers:
    - id: quote
      method: quote
"#;

    fn analyzed(source: &str) -> Vec<Finding> {
        let parsed = PythonParser::new().parse("app.py", source).unwrap();
        let mut doc = StructuralIrBuilder::new("r", &parsed).build(&parsed).unwrap();
        let out = DfgBuilder::new(&doc).build(&parsed);
        doc.dfg_variables = out.variables;
        doc.dfg_edges = out.edges;
        doc.expressions = out.expressions;

        let rules = RuleSet::from_yaml(RULES).unwrap();
        TaintEngine::new(rules).analyze(&doc)
    }

    #[test]
    fn test_sql_injection_end_to_end() {
        let source = "def handler():\n    q = request.args.get(\"x\")\n    cursor.execute(q)\n";
        let findings = analyzed(source);
        assert_eq!(findings.len(), 1);

        let f = &findings[0];
        assert_eq!(f.kind, "SQL_INJECTION");
        assert_eq!(f.sink_line, 3);
        let labels: Vec<&str> = f.path.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["q@assign", "q@arg", "execute@sink"]);

        let diff = compare_findings(&[], &findings);
        assert_eq!(diff.new.len(), 1);
        assert!(!diff.passed);
    }

    #[test]
    fn test_alias_chain_reaches_sink() {
        let source =
            "def handler():\n    q = request.args.get(\"x\")\n    r = q\n    cursor.execute(r)\n";
        let findings = analyzed(source);
        assert_eq!(findings.len(), 1);
        let labels: Vec<&str> = findings[0].path.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["q@assign", "r@alias", "r@arg", "execute@sink"]);
    }

    #[test]
    fn test_sanitizer_clears_taint() {
        let source = "def handler():\n    q = request.args.get(\"x\")\n    s = quote(q)\n    cursor.execute(s)\n";
        let findings = analyzed(source);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_untainted_sink_is_silent() {
        let findings = analyzed("def handler():\n    q = \"constant\"\n    cursor.execute(q)\n");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_unknown_call_propagates() {
        let source = "def handler():\n    q = request.args.get(\"x\")\n    t = transform(q)\n    cursor.execute(t)\n";
        let findings = analyzed(source);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_heuristic_eval_mode_flag() {
        let rules_text = r#"
atoms:
  sinks:
    - id: python-eval
      method: eval
      arg_roles: []
flags:
  heuristic_eval_sinks: true
"#;
        let parsed = PythonParser::new()
            .parse("app.py", "def f():\n    eval(\"2+2\")\n")
            .unwrap();
        let mut doc = StructuralIrBuilder::new("r", &parsed).build(&parsed).unwrap();
        let out = DfgBuilder::new(&doc).build(&parsed);
        doc.dfg_variables = out.variables;
        doc.dfg_edges = out.edges;
        doc.expressions = out.expressions;

        let rules = RuleSet::from_yaml(rules_text).unwrap();
        let findings = TaintEngine::new(rules).analyze(&doc);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].source.label, "eval@sink");
    }
}
