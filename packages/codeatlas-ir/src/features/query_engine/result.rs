//! Query results: paths plus an explicit completeness marker.
//!
//! `complete == false` is a first-class result, not an error; agent callers
//! use it to decide whether to pose a narrower sub-query.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruncationReason {
    None,
    Depth,
    PathLimit,
    NodeLimit,
    Timeout,
}

/// One path through the graph. `node_ids.len() == edge_ids.len() + 1`,
/// except for the single-node self path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub node_ids: Vec<String>,
    pub edge_ids: Vec<String>,
}

impl PathResult {
    /// Path length in edges.
    pub fn len(&self) -> usize {
        self.edge_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_ids.is_empty()
    }

    pub fn source(&self) -> Option<&str> {
        self.node_ids.first().map(String::as_str)
    }

    pub fn target(&self) -> Option<&str> {
        self.node_ids.last().map(String::as_str)
    }

    /// Node slice by index range.
    pub fn slice(&self, start: usize, end: usize) -> &[String] {
        let end = end.min(self.node_ids.len());
        let start = start.min(end);
        &self.node_ids[start..end]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSet {
    pub paths: Vec<PathResult>,
    pub complete: bool,
    pub truncation_reason: TruncationReason,
}

impl PathSet {
    pub fn empty(complete: bool, reason: TruncationReason) -> Self {
        Self {
            paths: Vec::new(),
            complete,
            truncation_reason: reason,
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn shortest(&self) -> Option<&PathResult> {
        self.paths.iter().min_by_key(|p| p.len())
    }

    pub fn longest(&self) -> Option<&PathResult> {
        self.paths.iter().max_by_key(|p| p.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(n: usize) -> PathResult {
        PathResult {
            node_ids: (0..=n).map(|i| format!("n{}", i)).collect(),
            edge_ids: (0..n).map(|i| format!("e{}", i)).collect(),
        }
    }

    #[test]
    fn test_len_and_slicing() {
        let p = path(3);
        assert_eq!(p.len(), 3);
        assert_eq!(p.slice(1, 3), &["n1".to_string(), "n2".to_string()]);
        assert_eq!(p.slice(2, 99).len(), 2);
    }

    #[test]
    fn test_shortest_longest() {
        let set = PathSet {
            paths: vec![path(3), path(1), path(5)],
            complete: true,
            truncation_reason: TruncationReason::None,
        };
        assert_eq!(set.shortest().unwrap().len(), 1);
        assert_eq!(set.longest().unwrap().len(), 5);
    }
}
