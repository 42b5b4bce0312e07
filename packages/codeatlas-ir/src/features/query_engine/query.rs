//! Path query model: flow expressions, edge classes, budgets.
//!
//! Unbounded traversal is forbidden by construction — every query carries a
//! hard depth, path, node and wall-time budget with documented defaults.

use super::result::PathResult;
use super::selector::Selector;
use crate::shared::models::EdgeKind;
use std::ops::{BitOr, Shl, Shr};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_DEPTH: usize = 4;
pub const DEFAULT_LIMIT_PATHS: usize = 20;
pub const DEFAULT_LIMIT_NODES: usize = 10_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A set of edge kinds, built with `|`: `E(Dfg) | E(Calls)`.
#[derive(Debug, Clone, Default)]
pub struct EdgeClass(pub Vec<EdgeKind>);

impl EdgeClass {
    pub fn contains(&self, kind: EdgeKind) -> bool {
        self.0.contains(&kind)
    }
}

impl From<EdgeKind> for EdgeClass {
    fn from(kind: EdgeKind) -> Self {
        EdgeClass(vec![kind])
    }
}

impl BitOr<EdgeKind> for EdgeClass {
    type Output = EdgeClass;

    fn bitor(mut self, rhs: EdgeKind) -> EdgeClass {
        if !self.0.contains(&rhs) {
            self.0.push(rhs);
        }
        self
    }
}

impl BitOr<EdgeClass> for EdgeClass {
    type Output = EdgeClass;

    fn bitor(mut self, rhs: EdgeClass) -> EdgeClass {
        for kind in rhs.0 {
            if !self.0.contains(&kind) {
                self.0.push(kind);
            }
        }
        self
    }
}

/// "Any path from a node matching `source` to a node matching `target`."
#[derive(Debug, Clone)]
pub struct FlowExpr {
    pub source: Selector,
    pub target: Selector,
    pub direction: Direction,
}

impl FlowExpr {
    pub fn new(source: Selector, target: Selector, direction: Direction) -> Self {
        Self {
            source,
            target,
            direction,
        }
    }

    /// Promote to an executable query with default budgets.
    pub fn any_path(self) -> AnyPathQuery {
        AnyPathQuery::new(self)
    }
}

// `S >> T`: forward reachability.
impl Shr<Selector> for Selector {
    type Output = FlowExpr;

    fn shr(self, rhs: Selector) -> FlowExpr {
        FlowExpr::new(self, rhs, Direction::Forward)
    }
}

// `S << T`: reverse reachability (paths from T back to S).
impl Shl<Selector> for Selector {
    type Output = FlowExpr;

    fn shl(self, rhs: Selector) -> FlowExpr {
        FlowExpr::new(rhs, self, Direction::Backward)
    }
}

type PathPredicate = Arc<dyn Fn(&PathResult) -> bool + Send + Sync>;

/// Executable path query.
///
/// Self paths (`S >> S`): a node matching both selectors yields one
/// single-node path rather than an empty result.
#[derive(Clone)]
pub struct AnyPathQuery {
    pub flow: FlowExpr,
    pub via: Option<EdgeClass>,
    pub depth: usize,
    pub limit_paths: usize,
    pub limit_nodes: usize,
    pub timeout: Duration,
    pub excluding: Option<Selector>,
    pub within: Option<Selector>,
    pub where_path: Option<PathPredicate>,
}

impl AnyPathQuery {
    pub fn new(flow: FlowExpr) -> Self {
        Self {
            flow,
            via: None,
            depth: DEFAULT_DEPTH,
            limit_paths: DEFAULT_LIMIT_PATHS,
            limit_nodes: DEFAULT_LIMIT_NODES,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            excluding: None,
            within: None,
            where_path: None,
        }
    }

    /// Restrict traversal to these edge kinds.
    pub fn via(mut self, edges: impl Into<EdgeClass>) -> Self {
        self.via = Some(edges.into());
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn limit_paths(mut self, limit: usize) -> Self {
        self.limit_paths = limit;
        self
    }

    pub fn limit_nodes(mut self, limit: usize) -> Self {
        self.limit_nodes = limit;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout_ms(self, ms: u64) -> Self {
        self.timeout(Duration::from_millis(ms))
    }

    /// Drop nodes matching the selector from the traversal.
    pub fn excluding(mut self, selector: Selector) -> Self {
        self.excluding = Some(selector);
        self
    }

    /// Restrict the traversal universe to nodes matching the selector.
    pub fn within(mut self, selector: Selector) -> Self {
        self.within = Some(selector);
        self
    }

    /// Keep only paths accepted by the predicate.
    pub fn where_path(mut self, pred: impl Fn(&PathResult) -> bool + Send + Sync + 'static) -> Self {
        self.where_path = Some(Arc::new(pred));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::query_engine::selector::Q;
    use crate::shared::models::NodeKind;

    #[test]
    fn test_operator_directions() {
        let fwd = Q::var("user") >> Q::func("execute");
        assert_eq!(fwd.direction, Direction::Forward);

        let bwd = Q::func("execute") << Q::var("user");
        assert_eq!(bwd.direction, Direction::Backward);
        // `T << S` keeps S as the path source.
        assert!(matches!(bwd.source, Selector::Predicate(_)));
    }

    #[test]
    fn test_edge_class_union() {
        let class = EdgeClass::from(EdgeKind::Dfg) | EdgeKind::Calls | EdgeKind::Calls;
        assert_eq!(class.0.len(), 2);
        assert!(class.contains(EdgeKind::Dfg));
        assert!(!class.contains(EdgeKind::Reads));
    }

    #[test]
    fn test_defaults() {
        let q = (Q::kind(NodeKind::Function) >> Q::any()).any_path();
        assert_eq!(q.depth, DEFAULT_DEPTH);
        assert_eq!(q.limit_paths, DEFAULT_LIMIT_PATHS);
        assert_eq!(q.limit_nodes, DEFAULT_LIMIT_NODES);
        assert_eq!(q.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
    }
}
