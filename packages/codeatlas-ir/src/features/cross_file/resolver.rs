//! Cross-file reference resolution.
//!
//! Rewrites import-local reference edges (targets carrying `unresolved_ref`)
//! to global node ids. Runs to a fixed point: targets only ever move from
//! external placeholders to concrete symbols, so the pass is monotone and
//! terminates even with module cycles.

use super::global_context::GlobalContext;
use crate::shared::models::IRDocument;
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResolveStats {
    pub edges_examined: usize,
    pub edges_rewritten: usize,
    pub passes: usize,
    /// References that stayed on their external placeholder.
    pub still_external: usize,
}

pub struct CrossFileResolver<'a> {
    ctx: &'a GlobalContext,
}

impl<'a> CrossFileResolver<'a> {
    pub fn new(ctx: &'a GlobalContext) -> Self {
        Self { ctx }
    }

    /// Resolve every document in place, files in parallel within each pass.
    pub fn resolve_all(&self, docs: &mut [IRDocument]) -> ResolveStats {
        let mut stats = ResolveStats::default();

        loop {
            stats.passes += 1;
            let per_doc: Vec<(usize, usize)> = docs
                .par_iter_mut()
                .map(|doc| self.resolve_document(doc))
                .collect();

            let examined: usize = per_doc.iter().map(|(e, _)| e).sum();
            let rewritten: usize = per_doc.iter().map(|(_, r)| r).sum();
            stats.edges_examined += examined;
            stats.edges_rewritten += rewritten;

            if rewritten == 0 {
                break;
            }
        }

        for doc in docs.iter() {
            stats.still_external += doc
                .edges
                .iter()
                .filter(|e| e.attrs.contains_key("unresolved_ref"))
                .count();
        }

        debug!(
            passes = stats.passes,
            rewritten = stats.edges_rewritten,
            still_external = stats.still_external,
            "cross-file resolution complete"
        );
        stats
    }

    /// Returns (edges examined, edges rewritten) for one document.
    fn resolve_document(&self, doc: &mut IRDocument) -> (usize, usize) {
        let mut examined = 0usize;
        let mut rewritten = 0usize;

        for edge in doc.edges.iter_mut() {
            let Some(reference) = edge.attr_str("unresolved_ref").map(str::to_string) else {
                continue;
            };
            examined += 1;

            if let Some(target) = self.ctx.resolve_fqn(&reference) {
                edge.target_id = target.clone();
                edge.attrs.remove("unresolved_ref");
                edge.attrs.insert(
                    "resolved_from".to_string(),
                    serde_json::Value::String(reference),
                );
                rewritten += 1;
            }
        }

        (examined, rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_generation::StructuralIrBuilder;
    use crate::features::parsing::{Parser, PythonParser};
    use crate::shared::models::EdgeKind;

    fn doc(path: &str, source: &str) -> IRDocument {
        let parsed = PythonParser::new().parse(path, source).unwrap();
        StructuralIrBuilder::new("r", &parsed).build(&parsed).unwrap()
    }

    #[test]
    fn test_imported_call_rewritten_to_concrete_symbol() {
        let util = doc("pkg/util.py", "def helper():\n    pass\n");
        let app = doc("app.py", "from pkg.util import helper\n\nhelper()\n");
        let mut docs = vec![util, app];

        let ctx = GlobalContext::build(&docs);
        let stats = CrossFileResolver::new(&ctx).resolve_all(&mut docs);

        assert!(stats.edges_rewritten >= 1);
        let helper_id = ctx.symbol_table.get("pkg.util.helper").unwrap();
        let call = docs[1]
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::Calls)
            .unwrap();
        assert_eq!(&call.target_id, helper_id);
        assert!(call.attrs.get("unresolved_ref").is_none());
    }

    #[test]
    fn test_unresolvable_stays_external() {
        let app = doc("app.py", "from vendor.sdk import client\n\nclient()\n");
        let mut docs = vec![app];

        let ctx = GlobalContext::build(&docs);
        let stats = CrossFileResolver::new(&ctx).resolve_all(&mut docs);

        assert_eq!(stats.edges_rewritten, 0);
        assert!(stats.still_external >= 1);
        let call = docs[0]
            .edges
            .iter()
            .find(|e| e.kind == EdgeKind::Calls)
            .unwrap();
        assert!(crate::shared::models::is_external_id(&call.target_id));
    }

    #[test]
    fn test_circular_imports_terminate() {
        // a imports b, b imports a; both resolvable → fixed point in finite passes.
        let a = doc("a.py", "from b import g\n\ndef f():\n    g()\n");
        let b = doc("b.py", "from a import f\n\ndef g():\n    f()\n");
        let mut docs = vec![a, b];

        let ctx = GlobalContext::build(&docs);
        let stats = CrossFileResolver::new(&ctx).resolve_all(&mut docs);

        assert!(stats.passes <= 3);
        let f_id = ctx.symbol_table.get("a.f").unwrap();
        let g_id = ctx.symbol_table.get("b.g").unwrap();
        assert!(docs[0].edges.iter().any(|e| e.kind == EdgeKind::Calls && &e.target_id == g_id));
        assert!(docs[1].edges.iter().any(|e| e.kind == EdgeKind::Calls && &e.target_id == f_id));
    }
}
