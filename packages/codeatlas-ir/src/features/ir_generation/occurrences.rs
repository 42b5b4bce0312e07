//! Occurrence collection: derive identifier appearances from the
//! structural IR.
//!
//! Definitions come from symbol nodes, references/writes/imports from the
//! reference edges. Output order is canonical (file order, then span order).

use crate::shared::models::{
    sort_occurrences, EdgeKind, IRDocument, Occurrence, OccurrenceRole,
};

pub struct OccurrenceCollector;

impl OccurrenceCollector {
    pub fn new() -> Self {
        Self
    }

    pub fn collect(&self, doc: &IRDocument) -> Vec<Occurrence> {
        let mut out = Vec::with_capacity(doc.nodes.len() + doc.edges.len());

        for node in &doc.nodes {
            if !node.kind.is_symbol() || node.is_external() {
                continue;
            }
            out.push(Occurrence::new(
                node.span,
                node.fqn.clone(),
                OccurrenceRole::Def,
                node.file_path.clone(),
            ));
        }

        for edge in &doc.edges {
            let role = match edge.kind {
                EdgeKind::Calls
                | EdgeKind::Reads
                | EdgeKind::References
                | EdgeKind::Inherits
                | EdgeKind::Instantiates => OccurrenceRole::Ref,
                EdgeKind::Writes => OccurrenceRole::Write,
                EdgeKind::Imports => OccurrenceRole::Import,
                _ => continue,
            };
            let Some(span) = edge.span else { continue };
            let symbol_fqn = doc
                .node_by_id(&edge.target_id)
                .map(|n| n.fqn.clone())
                .or_else(|| edge.attr_str("target_fqn").map(str::to_string))
                .or_else(|| edge.attr_str("unresolved_ref").map(str::to_string));
            let Some(symbol_fqn) = symbol_fqn else { continue };
            out.push(Occurrence::new(span, symbol_fqn, role, doc.file_path.clone()));
        }

        sort_occurrences(&mut out);
        out
    }
}

impl Default for OccurrenceCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_generation::ir_builder::StructuralIrBuilder;
    use crate::features::parsing::{Parser, PythonParser};

    fn occurrences_for(source: &str) -> Vec<Occurrence> {
        let parsed = PythonParser::new().parse("mod.py", source).unwrap();
        let doc = StructuralIrBuilder::new("r", &parsed).build(&parsed).unwrap();
        OccurrenceCollector::new().collect(&doc)
    }

    #[test]
    fn test_find_references_ordering() {
        // def at line 2, refs at lines 5 and 6
        let source = "\ndef foo():\n    pass\n\nfoo()\nfoo()\n";
        let occs = occurrences_for(source);
        let foo: Vec<_> = occs.iter().filter(|o| o.symbol_fqn == "mod.foo").collect();
        assert_eq!(foo.len(), 3);
        assert_eq!(
            (foo[0].span.start_line, foo[0].role),
            (2, OccurrenceRole::Def)
        );
        assert_eq!(
            (foo[1].span.start_line, foo[1].role),
            (5, OccurrenceRole::Ref)
        );
        assert_eq!(
            (foo[2].span.start_line, foo[2].role),
            (6, OccurrenceRole::Ref)
        );
    }

    #[test]
    fn test_import_occurrence_role() {
        let occs = occurrences_for("from os.path import join\n");
        assert!(occs
            .iter()
            .any(|o| o.role == OccurrenceRole::Import && o.symbol_fqn == "os.path.join"));
    }

    #[test]
    fn test_write_occurrence_in_function() {
        let occs = occurrences_for("def f():\n    x = 1\n");
        assert!(occs
            .iter()
            .any(|o| o.role == OccurrenceRole::Write && o.symbol_fqn == "mod.f.x"));
    }
}
