//! IRDocument: the per-file container every layer reads and the owning
//! layer extends.
//!
//! Later layers receive the document read-only; the three primary indexes
//! are built lazily on first query and frozen (build-then-freeze, safe for
//! concurrent readers).

use super::cfg::{CfgBlock, CfgEdge};
use super::edge::Edge;
use super::error::{CodeatlasError, Result};
use super::ids::ContentHash;
use super::node::{Node, NodeKind};
use super::occurrence::Occurrence;
use super::semantic::{DfgEdge, DfgVariable, Expression, SignatureEntity, TypeEntity};
use crate::shared::constants::{ENGINE_VERSION, EXTERNAL_FILE, SCHEMA_VERSION};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IRDocument {
    pub schema_version: u64,
    pub engine_version: u64,
    pub repo_id: String,
    pub file_path: String,
    pub language: String,
    pub content_hash: Option<ContentHash>,
    pub line_count: u32,

    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub occurrences: Vec<Occurrence>,
    pub types: Vec<TypeEntity>,
    pub signatures: Vec<SignatureEntity>,
    pub cfg_blocks: Vec<CfgBlock>,
    pub cfg_edges: Vec<CfgEdge>,
    pub expressions: Vec<Expression>,
    pub dfg_variables: Vec<DfgVariable>,
    pub dfg_edges: Vec<DfgEdge>,

    #[serde(skip)]
    by_id: OnceCell<HashMap<String, usize>>,
    #[serde(skip)]
    by_kind: OnceCell<HashMap<NodeKind, Vec<usize>>>,
    #[serde(skip)]
    by_file: OnceCell<HashMap<String, Vec<usize>>>,
}

impl PartialEq for IRDocument {
    fn eq(&self, other: &Self) -> bool {
        // Index caches are rebuildable and excluded from equality.
        self.schema_version == other.schema_version
            && self.engine_version == other.engine_version
            && self.repo_id == other.repo_id
            && self.file_path == other.file_path
            && self.language == other.language
            && self.content_hash == other.content_hash
            && self.line_count == other.line_count
            && self.nodes == other.nodes
            && self.edges == other.edges
            && self.occurrences == other.occurrences
            && self.types == other.types
            && self.signatures == other.signatures
            && self.cfg_blocks == other.cfg_blocks
            && self.cfg_edges == other.cfg_edges
            && self.expressions == other.expressions
            && self.dfg_variables == other.dfg_variables
            && self.dfg_edges == other.dfg_edges
    }
}

impl IRDocument {
    pub fn new(repo_id: impl Into<String>, file_path: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            engine_version: ENGINE_VERSION,
            repo_id: repo_id.into(),
            file_path: file_path.into(),
            language: language.into(),
            ..Default::default()
        }
    }

    /// Replace-on-duplicate insert: a second node with the same id replaces
    /// the first (last-writer-wins) and never splits identity.
    pub fn push_node(&mut self, node: Node) {
        self.invalidate_indexes();
        if let Some(existing) = self.nodes.iter_mut().find(|n| n.id == node.id) {
            *existing = node;
        } else {
            self.nodes.push(node);
        }
    }

    pub fn push_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    fn invalidate_indexes(&mut self) {
        self.by_id = OnceCell::new();
        self.by_kind = OnceCell::new();
        self.by_file = OnceCell::new();
    }

    fn index_by_id(&self) -> &HashMap<String, usize> {
        self.by_id.get_or_init(|| {
            self.nodes
                .iter()
                .enumerate()
                .map(|(i, n)| (n.id.clone(), i))
                .collect()
        })
    }

    fn index_by_kind(&self) -> &HashMap<NodeKind, Vec<usize>> {
        self.by_kind.get_or_init(|| {
            let mut map: HashMap<NodeKind, Vec<usize>> = HashMap::new();
            for (i, n) in self.nodes.iter().enumerate() {
                map.entry(n.kind).or_default().push(i);
            }
            map
        })
    }

    fn index_by_file(&self) -> &HashMap<String, Vec<usize>> {
        self.by_file.get_or_init(|| {
            let mut map: HashMap<String, Vec<usize>> = HashMap::new();
            for (i, n) in self.nodes.iter().enumerate() {
                map.entry(n.file_path.clone()).or_default().push(i);
            }
            map
        })
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.index_by_id().get(id).map(|&i| &self.nodes[i])
    }

    pub fn nodes_by_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.index_by_kind()
            .get(&kind)
            .map(|ids| ids.iter().map(|&i| &self.nodes[i]).collect())
            .unwrap_or_default()
    }

    pub fn nodes_in_file(&self, file_path: &str) -> Vec<&Node> {
        self.index_by_file()
            .get(file_path)
            .map(|ids| ids.iter().map(|&i| &self.nodes[i]).collect())
            .unwrap_or_default()
    }

    /// Check the layer-boundary invariants. A violation is a bug in the
    /// producing layer; the caller aborts the session.
    pub fn validate(&self) -> Result<()> {
        // 4. NodeId uniqueness within one document.
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(CodeatlasError::consistency(format!(
                    "duplicate node id {} in {}",
                    node.id, self.file_path
                )));
            }
        }

        // 2. Spans inside [1, line_count]; body_span ⊆ span.
        for node in &self.nodes {
            if node.file_path == EXTERNAL_FILE {
                continue;
            }
            if self.line_count > 0 && !node.span.is_valid(self.line_count) {
                return Err(CodeatlasError::consistency(format!(
                    "node {} span {:?} outside [1, {}]",
                    node.id, node.span, self.line_count
                ))
                .with_file(self.file_path.clone()));
            }
            if let Some(body) = node.body_span {
                if !node.span.contains(&body) {
                    return Err(CodeatlasError::consistency(format!(
                        "node {} body_span {:?} escapes span {:?}",
                        node.id, body, node.span
                    )));
                }
            }
        }

        // 1. Edge endpoints resolve, except external targets.
        let ids = self.index_by_id();
        for edge in &self.edges {
            if !ids.contains_key(&edge.source_id) {
                return Err(CodeatlasError::consistency(format!(
                    "edge {} has dangling source {}",
                    edge.id, edge.source_id
                )));
            }
            if !ids.contains_key(&edge.target_id) && !is_external_id(&edge.target_id) {
                return Err(CodeatlasError::consistency(format!(
                    "edge {} has dangling target {}",
                    edge.id, edge.target_id
                )));
            }
        }

        // 3. CONTAINS edges form a forest.
        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for edge in &self.edges {
            if edge.kind != super::edge::EdgeKind::Contains {
                continue;
            }
            if let Some(prev) = parent_of.insert(edge.target_id.as_str(), edge.source_id.as_str()) {
                if prev != edge.source_id {
                    return Err(CodeatlasError::consistency(format!(
                        "node {} has two parents: {} and {}",
                        edge.target_id, prev, edge.source_id
                    )));
                }
            }
        }
        for start in parent_of.keys() {
            let mut hops = 0usize;
            let mut cursor = *start;
            while let Some(parent) = parent_of.get(cursor) {
                cursor = *parent;
                hops += 1;
                if hops > self.nodes.len() {
                    return Err(CodeatlasError::consistency(format!(
                        "containment cycle through {}",
                        start
                    )));
                }
            }
        }

        Ok(())
    }
}

/// An id whose kind segment names an external placeholder. Used by the edge
/// invariant when the placeholder node lives in another document.
pub fn is_external_id(id: &str) -> bool {
    id.starts_with("external_") || id.contains(&format!(":{}:", EXTERNAL_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::edge::EdgeKind;
    use crate::shared::models::span::Span;

    fn doc_with_nodes() -> IRDocument {
        let mut doc = IRDocument::new("r", "a.py", "python");
        doc.line_count = 10;
        doc.push_node(Node::new(
            "file:r:a.py:a".to_string(),
            NodeKind::File,
            "a".to_string(),
            "a.py".to_string(),
            Span::new(1, 0, 10, 0),
        ));
        doc.push_node(Node::new(
            "function:r:a.py:a.foo".to_string(),
            NodeKind::Function,
            "a.foo".to_string(),
            "a.py".to_string(),
            Span::new(2, 0, 3, 0),
        ));
        doc
    }

    #[test]
    fn test_push_node_last_writer_wins() {
        let mut doc = doc_with_nodes();
        let replacement = Node::new(
            "function:r:a.py:a.foo".to_string(),
            NodeKind::Function,
            "a.foo".to_string(),
            "a.py".to_string(),
            Span::new(5, 0, 6, 0),
        );
        doc.push_node(replacement);
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.node_by_id("function:r:a.py:a.foo").unwrap().span.start_line, 5);
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let mut doc = doc_with_nodes();
        doc.push_edge(Edge::new(
            "contains:file:r:a.py:a→function:r:a.py:a.foo".to_string(),
            EdgeKind::Contains,
            "file:r:a.py:a".to_string(),
            "function:r:a.py:a.foo".to_string(),
        ));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_dangling_target() {
        let mut doc = doc_with_nodes();
        doc.push_edge(Edge::new(
            "calls:x→y".to_string(),
            EdgeKind::Calls,
            "function:r:a.py:a.foo".to_string(),
            "function:r:a.py:a.missing".to_string(),
        ));
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_validate_allows_external_target() {
        let mut doc = doc_with_nodes();
        doc.push_edge(Edge::new(
            "inherits:a→ext".to_string(),
            EdgeKind::Inherits,
            "function:r:a.py:a.foo".to_string(),
            "external_class:r:<external>:os.PathLike".to_string(),
        ));
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_span() {
        let mut doc = doc_with_nodes();
        doc.push_node(Node::new(
            "variable:r:a.py:a.v".to_string(),
            NodeKind::Variable,
            "a.v".to_string(),
            "a.py".to_string(),
            Span::new(11, 0, 12, 0),
        ));
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_indexes_lazy_and_consistent() {
        let doc = doc_with_nodes();
        assert_eq!(doc.nodes_by_kind(NodeKind::Function).len(), 1);
        assert_eq!(doc.nodes_in_file("a.py").len(), 2);
        assert!(doc.node_by_id("missing").is_none());
    }

    #[test]
    fn test_serde_round_trip_preserves_equality() {
        let doc = doc_with_nodes();
        let bytes = serde_json::to_vec(&doc).unwrap();
        let back: IRDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc, back);
    }
}
