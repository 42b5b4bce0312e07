//! Node selectors: describe node sets for path queries.

use crate::shared::models::{Node, NodeKind};
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

type NodePredicate = Arc<dyn Fn(&Node) -> bool + Send + Sync>;

/// A node-set description. Composable with `|` (union).
#[derive(Clone)]
pub enum Selector {
    Any,
    Kind(NodeKind),
    /// Bare name match (`foo`).
    Name(String),
    /// Exact fully-qualified name.
    Fqn(String),
    /// Fqn prefix (`app.handlers` matches everything in that module).
    Module(String),
    Union(Vec<Selector>),
    Predicate(NodePredicate),
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Any => write!(f, "Any"),
            Selector::Kind(k) => write!(f, "Kind({:?})", k),
            Selector::Name(n) => write!(f, "Name({})", n),
            Selector::Fqn(n) => write!(f, "Fqn({})", n),
            Selector::Module(m) => write!(f, "Module({})", m),
            Selector::Union(inner) => write!(f, "Union({:?})", inner),
            Selector::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

impl Selector {
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Selector::Any => true,
            Selector::Kind(kind) => node.kind == *kind,
            Selector::Name(name) => node.name.as_deref() == Some(name.as_str()),
            Selector::Fqn(fqn) => node.fqn == *fqn,
            Selector::Module(prefix) => {
                node.fqn == *prefix || node.fqn.starts_with(&format!("{}.", prefix))
            }
            Selector::Union(inner) => inner.iter().any(|s| s.matches(node)),
            Selector::Predicate(pred) => pred(node),
        }
    }
}

impl BitOr for Selector {
    type Output = Selector;

    fn bitor(self, rhs: Selector) -> Selector {
        match self {
            Selector::Union(mut inner) => {
                inner.push(rhs);
                Selector::Union(inner)
            }
            other => Selector::Union(vec![other, rhs]),
        }
    }
}

/// Selector constructors, mirroring the query surface.
pub struct Q;

impl Q {
    pub fn any() -> Selector {
        Selector::Any
    }

    pub fn kind(kind: NodeKind) -> Selector {
        Selector::Kind(kind)
    }

    pub fn name(name: impl Into<String>) -> Selector {
        Selector::Name(name.into())
    }

    pub fn fqn(fqn: impl Into<String>) -> Selector {
        Selector::Fqn(fqn.into())
    }

    pub fn module(prefix: impl Into<String>) -> Selector {
        Selector::Module(prefix.into())
    }

    /// Variables (and parameters) named `name`.
    pub fn var(name: impl Into<String>) -> Selector {
        let name = name.into();
        Selector::Predicate(Arc::new(move |n: &Node| {
            matches!(n.kind, NodeKind::Variable | NodeKind::Parameter | NodeKind::Field)
                && n.name.as_deref() == Some(name.as_str())
        }))
    }

    /// Functions or methods named `name`.
    pub fn func(name: impl Into<String>) -> Selector {
        let name = name.into();
        Selector::Predicate(Arc::new(move |n: &Node| {
            matches!(n.kind, NodeKind::Function | NodeKind::Method)
                && n.name.as_deref() == Some(name.as_str())
        }))
    }

    pub fn class(name: impl Into<String>) -> Selector {
        let name = name.into();
        Selector::Predicate(Arc::new(move |n: &Node| {
            n.kind == NodeKind::Class && n.name.as_deref() == Some(name.as_str())
        }))
    }

    pub fn where_(pred: impl Fn(&Node) -> bool + Send + Sync + 'static) -> Selector {
        Selector::Predicate(Arc::new(pred))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::Span;

    fn node(kind: NodeKind, name: &str, fqn: &str) -> Node {
        Node::new(
            format!("{}:r:f.py:{}", kind.as_str(), fqn),
            kind,
            fqn.to_string(),
            "f.py".to_string(),
            Span::new(1, 0, 1, 5),
        )
        .with_name(name)
    }

    #[test]
    fn test_kind_and_name_selectors() {
        let n = node(NodeKind::Function, "foo", "m.foo");
        assert!(Q::kind(NodeKind::Function).matches(&n));
        assert!(Q::name("foo").matches(&n));
        assert!(Q::func("foo").matches(&n));
        assert!(!Q::var("foo").matches(&n));
    }

    #[test]
    fn test_module_prefix() {
        let n = node(NodeKind::Function, "foo", "app.handlers.foo");
        assert!(Q::module("app.handlers").matches(&n));
        assert!(Q::module("app").matches(&n));
        assert!(!Q::module("app.handle").matches(&n));
    }

    #[test]
    fn test_union() {
        let n = node(NodeKind::Variable, "x", "m.x");
        let selector = Q::func("foo") | Q::var("x") | Q::name("zzz");
        assert!(selector.matches(&n));
    }
}
