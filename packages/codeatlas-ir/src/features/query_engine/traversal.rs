//! Query execution: budgeted BFS over the frozen graph store.
//!
//! Explicit worklist, visited bitmap, predecessor map for path
//! reconstruction. Never recursion.

use super::query::{AnyPathQuery, Direction};
use super::result::{PathResult, PathSet, TruncationReason};
use crate::features::graph_store::GraphStore;
use std::collections::VecDeque;
use std::time::Instant;

/// How often the wall clock is polled, in dequeues.
const TIMEOUT_POLL_INTERVAL: usize = 256;

pub struct QueryEngine<'s> {
    store: &'s GraphStore,
}

impl<'s> QueryEngine<'s> {
    pub fn new(store: &'s GraphStore) -> Self {
        Self { store }
    }

    pub fn execute(&self, query: &AnyPathQuery) -> PathSet {
        // `limit_paths == 0` can never produce a complete enumeration.
        if query.limit_paths == 0 {
            return PathSet::empty(false, TruncationReason::PathLimit);
        }

        let in_universe = |idx: u32| -> bool {
            let node = self.store.node_at(idx);
            if let Some(within) = &query.within {
                if !within.matches(node) {
                    return false;
                }
            }
            if let Some(excluding) = &query.excluding {
                if excluding.matches(node) {
                    return false;
                }
            }
            true
        };

        let mut sources: Vec<u32> = Vec::new();
        let mut is_target = vec![false; self.store.node_count()];
        let mut target_count = 0usize;
        for (idx, node) in self.store.iter_nodes() {
            if !in_universe(idx) {
                continue;
            }
            if query.flow.source.matches(node) {
                sources.push(idx);
            }
            if query.flow.target.matches(node) {
                is_target[idx as usize] = true;
                target_count += 1;
            }
        }

        if sources.is_empty() || target_count == 0 {
            return PathSet::empty(true, TruncationReason::None);
        }

        let started = Instant::now();
        let mut paths: Vec<PathResult> = Vec::new();
        let mut visited = vec![false; self.store.node_count()];
        let mut predecessor: Vec<Option<(u32, u32)>> = vec![None; self.store.node_count()];
        let mut queue: VecDeque<(u32, usize)> = VecDeque::new();
        let mut visited_count = 0usize;
        let mut depth_truncated = false;

        // Self paths: a source that is also a target yields the single-node
        // path.
        for &src in &sources {
            if is_target[src as usize] {
                let path = PathResult {
                    node_ids: vec![self.store.node_at(src).id.clone()],
                    edge_ids: Vec::new(),
                };
                if self.accept(query, &path) {
                    paths.push(path);
                    if paths.len() >= query.limit_paths {
                        return PathSet {
                            paths,
                            complete: false,
                            truncation_reason: TruncationReason::PathLimit,
                        };
                    }
                }
            }
        }

        for &src in &sources {
            if !visited[src as usize] {
                visited[src as usize] = true;
                visited_count += 1;
                queue.push_back((src, 0));
            }
        }

        let mut dequeues = 0usize;
        while let Some((current, depth)) = queue.pop_front() {
            dequeues += 1;
            if dequeues % TIMEOUT_POLL_INTERVAL == 0 && started.elapsed() >= query.timeout {
                return PathSet {
                    paths,
                    complete: false,
                    truncation_reason: TruncationReason::Timeout,
                };
            }

            let slice = match query.flow.direction {
                Direction::Forward => self.store.out_slice(current),
                Direction::Backward => self.store.in_slice(current),
            };

            for edge_ref in slice {
                if let Some(via) = &query.via {
                    if !via.contains(edge_ref.kind) {
                        continue;
                    }
                }
                let next = edge_ref.other;
                if visited[next as usize] || !in_universe(next) {
                    continue;
                }

                if depth >= query.depth {
                    depth_truncated = true;
                    continue;
                }

                visited[next as usize] = true;
                visited_count += 1;
                predecessor[next as usize] = Some((current, edge_ref.edge));

                if visited_count > query.limit_nodes {
                    return PathSet {
                        paths,
                        complete: false,
                        truncation_reason: TruncationReason::NodeLimit,
                    };
                }

                if is_target[next as usize] {
                    let path = self.reconstruct(next, &predecessor);
                    if self.accept(query, &path) {
                        paths.push(path);
                        if paths.len() >= query.limit_paths {
                            return PathSet {
                                paths,
                                complete: false,
                                truncation_reason: TruncationReason::PathLimit,
                            };
                        }
                    }
                }

                queue.push_back((next, depth + 1));
            }
        }

        PathSet {
            paths,
            complete: true,
            truncation_reason: if depth_truncated {
                TruncationReason::Depth
            } else {
                TruncationReason::None
            },
        }
    }

    fn accept(&self, query: &AnyPathQuery, path: &PathResult) -> bool {
        query.where_path.as_ref().map(|p| p(path)).unwrap_or(true)
    }

    fn reconstruct(&self, target: u32, predecessor: &[Option<(u32, u32)>]) -> PathResult {
        let mut node_ids = vec![self.store.node_at(target).id.clone()];
        let mut edge_ids = Vec::new();

        let mut cursor = target;
        while let Some((prev, edge)) = predecessor[cursor as usize] {
            edge_ids.push(self.store.edge_at(edge).id.clone());
            node_ids.push(self.store.node_at(prev).id.clone());
            cursor = prev;
        }

        node_ids.reverse();
        edge_ids.reverse();
        PathResult { node_ids, edge_ids }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::query_engine::query::EdgeClass;
    use crate::features::query_engine::selector::Q;
    use crate::shared::models::{Edge, EdgeKind, IRDocument, Node, NodeKind, Span};

    /// Hand-built chain v0 → v1 → … → v(n-1) over DFG edges.
    fn chain_store(n: usize) -> GraphStore {
        let mut doc = IRDocument::new("r", "chain.py", "python");
        doc.line_count = n as u32 + 1;
        for i in 0..n {
            doc.push_node(
                Node::new(
                    format!("variable:r:chain.py:m.v{}", i),
                    NodeKind::Variable,
                    format!("m.v{}", i),
                    "chain.py".to_string(),
                    Span::new(i as u32 + 1, 0, i as u32 + 1, 5),
                )
                .with_name(format!("v{}", i)),
            );
        }
        for i in 0..n.saturating_sub(1) {
            doc.push_edge(Edge::new(
                format!("dfg:v{}→v{}", i, i + 1),
                EdgeKind::Dfg,
                format!("variable:r:chain.py:m.v{}", i),
                format!("variable:r:chain.py:m.v{}", i + 1),
            ));
        }
        GraphStore::build("snap", vec![doc]).unwrap()
    }

    #[test]
    fn test_depth_cutoff_complete_but_truncated() {
        let store = chain_store(100);
        let engine = QueryEngine::new(&store);

        let query = (Q::var("v0") >> Q::var("v99"))
            .any_path()
            .via(EdgeClass::from(EdgeKind::Dfg))
            .depth(50);
        let result = engine.execute(&query);

        assert!(result.paths.is_empty());
        assert!(result.complete);
        assert_eq!(result.truncation_reason, TruncationReason::Depth);
    }

    #[test]
    fn test_full_depth_finds_single_path() {
        let store = chain_store(100);
        let engine = QueryEngine::new(&store);

        let query = (Q::var("v0") >> Q::var("v99"))
            .any_path()
            .via(EdgeClass::from(EdgeKind::Dfg))
            .depth(100)
            .limit_nodes(100_000);
        let result = engine.execute(&query);

        assert_eq!(result.paths.len(), 1);
        assert!(result.complete);
        assert_eq!(result.paths[0].len(), 99);
        assert_eq!(result.paths[0].node_ids.len(), 100);
    }

    #[test]
    fn test_no_path_longer_than_depth_plus_one_nodes() {
        let store = chain_store(20);
        let engine = QueryEngine::new(&store);

        let query = (Q::var("v0") >> Q::any())
            .any_path()
            .via(EdgeClass::from(EdgeKind::Dfg))
            .depth(5)
            .limit_paths(100);
        let result = engine.execute(&query);

        assert!(!result.paths.is_empty());
        for path in &result.paths {
            assert!(path.node_ids.len() <= 6);
        }
    }

    #[test]
    fn test_limit_paths_zero_boundary() {
        let store = chain_store(3);
        let engine = QueryEngine::new(&store);

        let query = (Q::var("v0") >> Q::var("v2")).any_path().limit_paths(0);
        let result = engine.execute(&query);

        assert!(result.paths.is_empty());
        assert!(!result.complete);
        assert_eq!(result.truncation_reason, TruncationReason::PathLimit);
    }

    #[test]
    fn test_self_path_returns_single_node() {
        let store = chain_store(3);
        let engine = QueryEngine::new(&store);

        let query = (Q::var("v1") >> Q::var("v1")).any_path();
        let result = engine.execute(&query);

        assert_eq!(result.paths.len(), 1);
        assert_eq!(result.paths[0].node_ids.len(), 1);
        assert!(result.paths[0].edge_ids.is_empty());
    }

    #[test]
    fn test_path_limit_truncates() {
        let store = chain_store(20);
        let engine = QueryEngine::new(&store);

        let query = (Q::var("v0") >> Q::any())
            .any_path()
            .via(EdgeClass::from(EdgeKind::Dfg))
            .depth(19)
            .limit_paths(3);
        let result = engine.execute(&query);

        assert_eq!(result.paths.len(), 3);
        assert!(!result.complete);
        assert_eq!(result.truncation_reason, TruncationReason::PathLimit);
    }

    #[test]
    fn test_excluding_blocks_traversal() {
        let store = chain_store(5);
        let engine = QueryEngine::new(&store);

        let query = (Q::var("v0") >> Q::var("v4"))
            .any_path()
            .via(EdgeClass::from(EdgeKind::Dfg))
            .depth(10)
            .excluding(Q::var("v2"));
        let result = engine.execute(&query);

        assert!(result.paths.is_empty());
        assert!(result.complete);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut doc = IRDocument::new("r", "cyc.py", "python");
        doc.line_count = 3;
        for name in ["a", "b"] {
            doc.push_node(
                Node::new(
                    format!("variable:r:cyc.py:m.{}", name),
                    NodeKind::Variable,
                    format!("m.{}", name),
                    "cyc.py".to_string(),
                    Span::new(1, 0, 1, 1),
                )
                .with_name(name),
            );
        }
        doc.push_edge(Edge::new(
            "dfg:a→b".to_string(),
            EdgeKind::Dfg,
            "variable:r:cyc.py:m.a".to_string(),
            "variable:r:cyc.py:m.b".to_string(),
        ));
        doc.push_edge(Edge::new(
            "dfg:b→a".to_string(),
            EdgeKind::Dfg,
            "variable:r:cyc.py:m.b".to_string(),
            "variable:r:cyc.py:m.a".to_string(),
        ));
        let store = GraphStore::build("snap", vec![doc]).unwrap();
        let engine = QueryEngine::new(&store);

        let query = (Q::var("a") >> Q::var("b")).any_path().depth(10);
        let result = engine.execute(&query);
        assert_eq!(result.paths.len(), 1);
        assert!(result.complete);
    }
}
