//! File-level dependency graph and transitive impact analysis.
//!
//! Built from resolved imports; drives the orchestrator's incremental
//! re-enrichment step.

use super::global_context::GlobalContext;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rustc_hash::FxHashMap;
use std::collections::{HashSet, VecDeque};

/// Outcome of a bounded impact walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactResult {
    /// Files that must be re-processed (changed files included), sorted.
    pub affected: Vec<String>,
    /// Walk exceeded the budget; the caller falls back to a full rebuild.
    pub escalate_full_rebuild: bool,
}

pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index_of: FxHashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Edge direction: importer → imported file.
    pub fn build(ctx: &GlobalContext) -> Self {
        let mut graph = DiGraph::new();
        let mut index_of: FxHashMap<String, NodeIndex> = FxHashMap::default();

        let mut index_for = |graph: &mut DiGraph<String, ()>,
                             index_of: &mut FxHashMap<String, NodeIndex>,
                             file: &str| {
            if let Some(&idx) = index_of.get(file) {
                idx
            } else {
                let idx = graph.add_node(file.to_string());
                index_of.insert(file.to_string(), idx);
                idx
            }
        };

        for (file, modules) in &ctx.file_imports {
            let from = index_for(&mut graph, &mut index_of, file);
            for module in modules {
                if let Some(target_file) = ctx.module_index.get(module) {
                    let to = index_for(&mut graph, &mut index_of, target_file);
                    if from != to {
                        graph.update_edge(from, to, ());
                    }
                }
            }
        }

        Self { graph, index_of }
    }

    pub fn file_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Files that directly import `file`.
    pub fn dependents_of(&self, file: &str) -> Vec<String> {
        let Some(&idx) = self.index_of.get(file) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    /// Transitive dependents of the changed set, bounded by `max_files`.
    /// Cycle-safe (visited set); exceeding the bound escalates.
    pub fn impact(&self, changed: &[String], max_files: usize) -> ImpactResult {
        let mut affected: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = changed.iter().cloned().collect();

        while let Some(file) = queue.pop_front() {
            if !affected.insert(file.clone()) {
                continue;
            }
            if affected.len() > max_files {
                return ImpactResult {
                    affected: Vec::new(),
                    escalate_full_rebuild: true,
                };
            }
            for dependent in self.dependents_of(&file) {
                if !affected.contains(&dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        let mut affected: Vec<String> = affected.into_iter().collect();
        affected.sort();
        ImpactResult {
            affected,
            escalate_full_rebuild: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_generation::StructuralIrBuilder;
    use crate::features::parsing::{Parser, PythonParser};
    use crate::shared::models::IRDocument;

    fn doc(path: &str, source: &str) -> IRDocument {
        let parsed = PythonParser::new().parse(path, source).unwrap();
        StructuralIrBuilder::new("r", &parsed).build(&parsed).unwrap()
    }

    fn chain_ctx() -> GlobalContext {
        // c imports b, b imports a
        let a = doc("a.py", "def fa():\n    pass\n");
        let b = doc("b.py", "from a import fa\n\ndef fb():\n    fa()\n");
        let c = doc("c.py", "from b import fb\n\ndef fc():\n    fb()\n");
        GlobalContext::build(&[a, b, c])
    }

    #[test]
    fn test_dependents() {
        let graph = DependencyGraph::build(&chain_ctx());
        assert_eq!(graph.dependents_of("a.py"), vec!["b.py".to_string()]);
        assert_eq!(graph.dependents_of("b.py"), vec!["c.py".to_string()]);
        assert!(graph.dependents_of("c.py").is_empty());
    }

    #[test]
    fn test_transitive_impact() {
        let graph = DependencyGraph::build(&chain_ctx());
        let result = graph.impact(&["a.py".to_string()], 100);
        assert!(!result.escalate_full_rebuild);
        assert_eq!(
            result.affected,
            vec!["a.py".to_string(), "b.py".to_string(), "c.py".to_string()]
        );
    }

    #[test]
    fn test_impact_budget_escalates() {
        let graph = DependencyGraph::build(&chain_ctx());
        let result = graph.impact(&["a.py".to_string()], 2);
        assert!(result.escalate_full_rebuild);
    }

    #[test]
    fn test_cycles_terminate() {
        let a = doc("x.py", "from y import g\n\ndef f():\n    pass\n");
        let b = doc("y.py", "from x import f\n\ndef g():\n    pass\n");
        let ctx = GlobalContext::build(&[a, b]);
        let graph = DependencyGraph::build(&ctx);

        let result = graph.impact(&["x.py".to_string()], 100);
        assert!(!result.escalate_full_rebuild);
        assert_eq!(result.affected.len(), 2);
    }
}
