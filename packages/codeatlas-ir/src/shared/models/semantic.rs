//! Semantic records: types, signatures, expressions, data-flow entities.
//!
//! Stored as flat arrays on the IR document and referenced by id.

use super::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Canonicalized type expression (nominal or structural).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEntity {
    pub id: String,
    /// Canonical rendering, e.g. `list[dict[str, int]]`.
    pub repr: String,
    /// Nominal head symbol when one exists (`dict`, `MyClass`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominal: Option<String>,
    #[serde(default)]
    pub is_structural: bool,
}

impl TypeEntity {
    pub fn nominal(id: impl Into<String>, repr: impl Into<String>) -> Self {
        let repr = repr.into();
        let head = repr
            .split(['[', '(']).next()
            .unwrap_or(&repr)
            .trim()
            .to_string();
        Self {
            id: id.into(),
            repr,
            nominal: Some(head),
            is_structural: false,
        }
    }
}

/// Callable signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureEntity {
    pub id: String,
    pub function_node_id: String,
    pub parameters: Vec<ParameterInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type_id: Option<String>,
}

impl SignatureEntity {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,
    #[serde(default)]
    pub has_default: bool,
}

/// Expression kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpressionKind {
    Call,
    Assign,
    Literal,
    Name,
    Attribute,
    Subscript,
    BinaryOp,
    BoolOp,
    Compare,
    Return,
    Await,
}

/// Expression record. `attrs` carries kind-specific facts (`callee_name`,
/// `callee_fqn`, `base`, `targets`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub id: String,
    pub kind: ExpressionKind,
    pub function_node_id: String,
    pub span: Span,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, serde_json::Value>,
}

impl Expression {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

/// One variable entity per lexical definition (no SSA; redefinition mints a
/// new entity and phi-nodes are approximated by multiple incoming edges).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfgVariable {
    pub id: String,
    pub name: String,
    pub function_node_id: String,
    pub span: Span,
    #[serde(default)]
    pub is_parameter: bool,
    /// Synthetic entity standing for the function's return value.
    #[serde(default)]
    pub is_return: bool,
}

/// Data-flow edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DfgEdgeKind {
    /// RHS expression feeds the LHS variable.
    Assign,
    /// `y = x` — variable-to-variable.
    Alias,
    /// Argument expression feeds a callee parameter.
    Arg,
    /// Return expression feeds the synthetic return variable.
    Return,
}

impl DfgEdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DfgEdgeKind::Assign => "assign",
            DfgEdgeKind::Alias => "alias",
            DfgEdgeKind::Arg => "arg",
            DfgEdgeKind::Return => "return",
        }
    }
}

/// Data-flow edge between variables/expressions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DfgEdge {
    pub kind: DfgEdgeKind,
    /// Variable or expression id on the producing side.
    pub source_id: String,
    /// Variable id on the consuming side.
    pub target_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nominal_head_extraction() {
        let t = TypeEntity::nominal("type:1", "dict[str, int]");
        assert_eq!(t.nominal.as_deref(), Some("dict"));

        let plain = TypeEntity::nominal("type:2", "MyClass");
        assert_eq!(plain.nominal.as_deref(), Some("MyClass"));
    }

    #[test]
    fn test_signature_arity() {
        let sig = SignatureEntity {
            id: "sig:1".to_string(),
            function_node_id: "f".to_string(),
            parameters: vec![
                ParameterInfo { name: "a".to_string(), type_id: None, has_default: false },
                ParameterInfo { name: "b".to_string(), type_id: None, has_default: true },
            ],
            return_type_id: None,
        };
        assert_eq!(sig.arity(), 2);
    }
}
