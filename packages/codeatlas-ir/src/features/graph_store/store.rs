//! Snapshot graph store: contiguous node array, u32 indexes, CSR edges.
//!
//! Built once per snapshot from the per-file IR documents, then frozen:
//! the serve phase is read-only and lock-free. String ids are kept in a
//! parallel table for external I/O; internal traversal never touches them.

use crate::shared::models::{
    is_external_id, CodeatlasError, Edge, EdgeKind, IRDocument, Node, NodeKind, Result, Span,
    SpanId, SpanPool,
};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

/// One CSR slot: edge kind, the node on the other end, and the index of the
/// full edge payload.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRef {
    pub kind: EdgeKind,
    pub other: u32,
    pub edge: u32,
}

#[derive(Debug)]
pub struct GraphStore {
    snapshot_id: String,
    nodes: Vec<Node>,
    id_to_index: FxHashMap<String, u32>,
    edges: Vec<Edge>,

    out_offsets: Vec<u32>,
    out_edges: Vec<EdgeRef>,
    in_offsets: Vec<u32>,
    in_edges: Vec<EdgeRef>,

    by_kind: FxHashMap<NodeKind, Vec<u32>>,
    /// Interned node spans (process-wide pool, deduped across snapshots).
    node_spans: Vec<SpanId>,
}

impl GraphStore {
    /// Build the store from per-file documents. Documents are moved in; the
    /// store owns all nodes and edges for the snapshot's lifetime.
    ///
    /// Global consistency is enforced here: after cross-file resolution an
    /// edge may legally point into another file, but a dangling non-external
    /// target is a builder bug and aborts the build.
    pub fn build(snapshot_id: impl Into<String>, docs: Vec<IRDocument>) -> Result<Self> {
        let mut nodes: Vec<Node> = Vec::new();
        let mut id_to_index: FxHashMap<String, u32> = FxHashMap::default();
        let mut edges: Vec<Edge> = Vec::new();

        for doc in docs {
            for node in doc.nodes {
                match id_to_index.get(&node.id) {
                    // Duplicate inserts replace (external placeholders are
                    // materialized per file) but never split identity.
                    Some(&idx) => nodes[idx as usize] = node,
                    None => {
                        let idx = nodes.len() as u32;
                        id_to_index.insert(node.id.clone(), idx);
                        nodes.push(node);
                    }
                }
            }
            edges.extend(doc.edges);
        }

        for edge in &edges {
            if !id_to_index.contains_key(&edge.source_id) {
                return Err(CodeatlasError::consistency(format!(
                    "edge {} has dangling source {}",
                    edge.id, edge.source_id
                )));
            }
            if !id_to_index.contains_key(&edge.target_id) && !is_external_id(&edge.target_id) {
                return Err(CodeatlasError::consistency(format!(
                    "edge {} has dangling target {}",
                    edge.id, edge.target_id
                )));
            }
        }

        // External targets whose placeholder lives in no kept document are
        // dropped from the CSR (the payload list keeps them for I/O).
        let n = nodes.len();
        let mut out_pairs: Vec<(u32, EdgeRef)> = Vec::with_capacity(edges.len());
        let mut in_pairs: Vec<(u32, EdgeRef)> = Vec::with_capacity(edges.len());
        let mut dropped = 0usize;

        for (i, edge) in edges.iter().enumerate() {
            let (Some(&src), Some(&dst)) = (
                id_to_index.get(&edge.source_id),
                id_to_index.get(&edge.target_id),
            ) else {
                dropped += 1;
                continue;
            };
            out_pairs.push((
                src,
                EdgeRef {
                    kind: edge.kind,
                    other: dst,
                    edge: i as u32,
                },
            ));
            in_pairs.push((
                dst,
                EdgeRef {
                    kind: edge.kind,
                    other: src,
                    edge: i as u32,
                },
            ));
        }
        if dropped > 0 {
            warn!(dropped, "edges to unmaterialized externals left out of CSR");
        }

        let (out_offsets, out_edges) = build_csr(n, out_pairs);
        let (in_offsets, in_edges) = build_csr(n, in_pairs);

        let mut by_kind: FxHashMap<NodeKind, Vec<u32>> = FxHashMap::default();
        for (i, node) in nodes.iter().enumerate() {
            by_kind.entry(node.kind).or_default().push(i as u32);
        }

        let pool = SpanPool::global();
        let node_spans: Vec<SpanId> = nodes.iter().map(|n| pool.intern(n.span)).collect();

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            interned_spans = pool.len(),
            "graph store frozen"
        );

        Ok(Self {
            snapshot_id: snapshot_id.into(),
            nodes,
            id_to_index,
            edges,
            out_offsets,
            out_edges,
            in_offsets,
            in_edges,
            by_kind,
            node_spans,
        })
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    // ── public contract (string-id surface) ────────────────────────

    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.id_to_index.get(id).map(|&i| &self.nodes[i as usize])
    }

    pub fn get_edges_by_source(&self, id: &str) -> Vec<&Edge> {
        self.index_of(id)
            .map(|i| {
                self.out_slice(i)
                    .iter()
                    .map(|r| &self.edges[r.edge as usize])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_edges_by_target(&self, id: &str) -> Vec<&Edge> {
        self.index_of(id)
            .map(|i| {
                self.in_slice(i)
                    .iter()
                    .map(|r| &self.edges[r.edge as usize])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_edges_by_source_kind(&self, id: &str, kind: EdgeKind) -> Vec<&Edge> {
        self.index_of(id)
            .map(|i| {
                // Slice is sorted by kind; a linear scan over one node's
                // edges is already O(k).
                self.out_slice(i)
                    .iter()
                    .filter(|r| r.kind == kind)
                    .map(|r| &self.edges[r.edge as usize])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_nodes_by_kind(&self, kind: NodeKind) -> Vec<&Node> {
        self.by_kind
            .get(&kind)
            .map(|ids| ids.iter().map(|&i| &self.nodes[i as usize]).collect())
            .unwrap_or_default()
    }

    // ── index surface (query engine hot path) ──────────────────────

    pub fn index_of(&self, id: &str) -> Option<u32> {
        self.id_to_index.get(id).copied()
    }

    pub fn node_at(&self, index: u32) -> &Node {
        &self.nodes[index as usize]
    }

    /// Node span through the interning pool.
    pub fn node_span(&self, index: u32) -> Span {
        SpanPool::global()
            .resolve(self.node_spans[index as usize])
            .unwrap_or_default()
    }

    pub fn edge_at(&self, index: u32) -> &Edge {
        &self.edges[index as usize]
    }

    pub fn out_slice(&self, index: u32) -> &[EdgeRef] {
        let i = index as usize;
        &self.out_edges[self.out_offsets[i] as usize..self.out_offsets[i + 1] as usize]
    }

    pub fn in_slice(&self, index: u32) -> &[EdgeRef] {
        let i = index as usize;
        &self.in_edges[self.in_offsets[i] as usize..self.in_offsets[i + 1] as usize]
    }

    pub fn indexes_by_kind(&self, kind: NodeKind) -> &[u32] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (u32, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (i as u32, n))
    }

    /// Borrow the raw node/edge payloads (warm-start serialization).
    pub fn parts(&self) -> (&[Node], &[Edge]) {
        (&self.nodes, &self.edges)
    }

    /// Rebuild a store from previously serialized parts. Indexes and CSR
    /// slices are derived, not persisted.
    pub fn from_parts(
        snapshot_id: impl Into<String>,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    ) -> Result<Self> {
        let mut doc = IRDocument::default();
        doc.nodes = nodes;
        doc.edges = edges;
        Self::build(snapshot_id, vec![doc])
    }
}

/// Pack (node, edge-ref) pairs into offsets + a slice array sorted by
/// (node, kind).
fn build_csr(n: usize, mut pairs: Vec<(u32, EdgeRef)>) -> (Vec<u32>, Vec<EdgeRef>) {
    pairs.sort_by_key(|(node, r)| (*node, r.kind));

    let mut offsets = vec![0u32; n + 1];
    for (node, _) in &pairs {
        offsets[*node as usize + 1] += 1;
    }
    for i in 0..n {
        offsets[i + 1] += offsets[i];
    }
    let refs = pairs.into_iter().map(|(_, r)| r).collect();
    (offsets, refs)
}
