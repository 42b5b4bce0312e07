//! GlobalContext: aggregated per-file symbol tables and module index.

use crate::features::ir_generation::module_path_for;
use crate::shared::models::{IRDocument, NodeId};
use rustc_hash::FxHashMap;

/// Snapshot-wide symbol aggregation consumed by the resolver and the
/// orchestrator's impact pass.
#[derive(Debug, Default)]
pub struct GlobalContext {
    /// fqn → node id, across every file. Last writer wins, matching the
    /// per-file symbol-table rule.
    pub symbol_table: FxHashMap<String, NodeId>,
    /// module path → file path.
    pub module_index: FxHashMap<String, String>,
    /// module path → exported name → node id. Exports are the top-level
    /// symbols (direct children of the file node).
    pub exports: FxHashMap<String, FxHashMap<String, NodeId>>,
    /// file path → imported module paths (drives the dependency graph).
    pub file_imports: FxHashMap<String, Vec<String>>,
}

impl GlobalContext {
    pub fn build(docs: &[IRDocument]) -> Self {
        let mut ctx = GlobalContext::default();

        for doc in docs {
            let module_path = module_path_for(&doc.file_path);
            ctx.module_index
                .insert(module_path.clone(), doc.file_path.clone());

            let file_node_id = doc
                .nodes
                .iter()
                .find(|n| n.kind == crate::shared::models::NodeKind::File)
                .map(|n| n.id.clone());

            let module_exports = ctx.exports.entry(module_path.clone()).or_default();
            for node in &doc.nodes {
                if node.is_external() || !node.kind.is_symbol() {
                    continue;
                }
                ctx.symbol_table.insert(node.fqn.clone(), node.id.clone());
                // Top-level symbols are exported under their bare name.
                if node.parent_id == file_node_id {
                    if let Some(name) = &node.name {
                        module_exports.insert(name.clone(), node.id.clone());
                    }
                }
            }

            let mut imported_modules: Vec<String> = doc
                .nodes
                .iter()
                .filter(|n| n.kind == crate::shared::models::NodeKind::Import)
                .filter_map(|n| n.attr_str("module").map(str::to_string))
                .collect();
            imported_modules.sort();
            imported_modules.dedup();
            ctx.file_imports
                .insert(doc.file_path.clone(), imported_modules);
        }

        ctx
    }

    /// Resolve a dotted fqn to an in-repo export: longest module prefix wins.
    pub fn resolve_fqn(&self, fqn: &str) -> Option<&NodeId> {
        // Fast path: the fqn is a known symbol as-is.
        if let Some(id) = self.symbol_table.get(fqn) {
            return Some(id);
        }

        let parts: Vec<&str> = fqn.split('.').collect();
        for split in (1..parts.len()).rev() {
            let module = parts[..split].join(".");
            if let Some(exports) = self.exports.get(&module) {
                let name = parts[split..].join(".");
                if let Some(id) = exports.get(&name) {
                    return Some(id);
                }
            }
        }
        None
    }

    pub fn symbol_count(&self) -> usize {
        self.symbol_table.len()
    }
}
