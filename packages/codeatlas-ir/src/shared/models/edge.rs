//! Edge model: typed relations between nodes.

use super::ids::NodeId;
use super::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Edge kind. The query engine selects edges per kind, never by pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    // Structural
    Contains,
    Defines,
    Imports,
    Exports,

    // References
    Calls,
    Instantiates,
    Inherits,
    Implements,
    Overrides,
    References,
    Reads,
    Writes,
    Returns,
    Throws,
    Catches,
    DecoratedWith,
    TypeAnnotation,

    // Control flow
    CfgNext,
    CfgTrue,
    CfgFalse,
    CfgBack,
    CfgHandler,

    // Data flow
    Dfg,
    DefUse,

    // Taint
    Taints,
    Sanitizes,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "contains",
            EdgeKind::Defines => "defines",
            EdgeKind::Imports => "imports",
            EdgeKind::Exports => "exports",
            EdgeKind::Calls => "calls",
            EdgeKind::Instantiates => "instantiates",
            EdgeKind::Inherits => "inherits",
            EdgeKind::Implements => "implements",
            EdgeKind::Overrides => "overrides",
            EdgeKind::References => "references",
            EdgeKind::Reads => "reads",
            EdgeKind::Writes => "writes",
            EdgeKind::Returns => "returns",
            EdgeKind::Throws => "throws",
            EdgeKind::Catches => "catches",
            EdgeKind::DecoratedWith => "decorated_with",
            EdgeKind::TypeAnnotation => "type_annotation",
            EdgeKind::CfgNext => "cfg_next",
            EdgeKind::CfgTrue => "cfg_true",
            EdgeKind::CfgFalse => "cfg_false",
            EdgeKind::CfgBack => "cfg_back",
            EdgeKind::CfgHandler => "cfg_handler",
            EdgeKind::Dfg => "dfg",
            EdgeKind::DefUse => "def_use",
            EdgeKind::Taints => "taints",
            EdgeKind::Sanitizes => "sanitizes",
        }
    }
}

/// Graph edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub kind: EdgeKind,
    pub source_id: NodeId,
    pub target_id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, serde_json::Value>,
}

impl Edge {
    pub fn new(id: String, kind: EdgeKind, source_id: NodeId, target_id: NodeId) -> Self {
        Self {
            id,
            kind,
            source_id,
            target_id,
            span: None,
            attrs: HashMap::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_construction() {
        let edge = Edge::new(
            "calls:a→b".to_string(),
            EdgeKind::Calls,
            "a".to_string(),
            "b".to_string(),
        )
        .with_span(Span::new(5, 0, 5, 10));

        assert_eq!(edge.kind, EdgeKind::Calls);
        assert_eq!(edge.span.unwrap().start_line, 5);
    }
}
