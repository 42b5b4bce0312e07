//! Node model: typed graph vertices for the structural and semantic IR.

use super::ids::NodeId;
use super::span::Span;
use crate::shared::constants::EXTERNAL_FILE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Broad grouping of node kinds. Used by invariant checks (external targets
/// are exempt from edge-target resolution) and by retrieval filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KindGroup {
    Structural,
    TypeSystem,
    ControlFlow,
    Semantic,
    External,
    Framework,
}

/// Node kind. Kind-tagged dispatch only; there is no inheritance-based
/// polymorphism anywhere in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // Structural
    Directory,
    File,
    Module,
    Class,
    DataClass,
    Enum,
    EnumMember,
    Interface,
    Trait,
    Struct,
    Function,
    Method,
    Lambda,
    Parameter,
    Variable,
    Constant,
    Field,
    Import,
    Decorator,
    Comment,
    Docstring,

    // Type system
    Type,
    TypeAlias,
    TypeParameter,
    Signature,
    AssociatedType,
    Protocol,

    // Control flow
    CfgBlock,
    Branch,
    Loop,
    Try,
    Catch,
    Finally,
    Return,
    Raise,
    Break,
    Continue,
    Assert,
    Yield,

    // Semantic
    Expression,
    Call,
    Assignment,
    BinaryOp,
    UnaryOp,
    BooleanOp,
    Comparison,
    Literal,
    Collection,
    Comprehension,
    ConditionalExpression,
    FieldAccess,
    Subscript,
    Index,
    ObjectInstantiation,
    LambdaDefinition,
    VariableRead,
    Await,

    // External placeholders
    ExternalModule,
    ExternalClass,
    ExternalFunction,
    ExternalType,
    ExternalVariable,

    // Framework-flavored
    Route,
    Middleware,
    Service,
    Repository,
    Job,
    Channel,
    Config,
    Migration,
    Test,
    Fixture,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Directory => "directory",
            NodeKind::File => "file",
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::DataClass => "data_class",
            NodeKind::Enum => "enum",
            NodeKind::EnumMember => "enum_member",
            NodeKind::Interface => "interface",
            NodeKind::Trait => "trait",
            NodeKind::Struct => "struct",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Lambda => "lambda",
            NodeKind::Parameter => "parameter",
            NodeKind::Variable => "variable",
            NodeKind::Constant => "constant",
            NodeKind::Field => "field",
            NodeKind::Import => "import",
            NodeKind::Decorator => "decorator",
            NodeKind::Comment => "comment",
            NodeKind::Docstring => "docstring",
            NodeKind::Type => "type",
            NodeKind::TypeAlias => "type_alias",
            NodeKind::TypeParameter => "type_parameter",
            NodeKind::Signature => "signature",
            NodeKind::AssociatedType => "associated_type",
            NodeKind::Protocol => "protocol",
            NodeKind::CfgBlock => "cfg_block",
            NodeKind::Branch => "branch",
            NodeKind::Loop => "loop",
            NodeKind::Try => "try",
            NodeKind::Catch => "catch",
            NodeKind::Finally => "finally",
            NodeKind::Return => "return",
            NodeKind::Raise => "raise",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Assert => "assert",
            NodeKind::Yield => "yield",
            NodeKind::Expression => "expression",
            NodeKind::Call => "call",
            NodeKind::Assignment => "assignment",
            NodeKind::BinaryOp => "binary_op",
            NodeKind::UnaryOp => "unary_op",
            NodeKind::BooleanOp => "boolean_op",
            NodeKind::Comparison => "comparison",
            NodeKind::Literal => "literal",
            NodeKind::Collection => "collection",
            NodeKind::Comprehension => "comprehension",
            NodeKind::ConditionalExpression => "conditional_expression",
            NodeKind::FieldAccess => "field_access",
            NodeKind::Subscript => "subscript",
            NodeKind::Index => "index",
            NodeKind::ObjectInstantiation => "object_instantiation",
            NodeKind::LambdaDefinition => "lambda_definition",
            NodeKind::VariableRead => "variable_read",
            NodeKind::Await => "await",
            NodeKind::ExternalModule => "external_module",
            NodeKind::ExternalClass => "external_class",
            NodeKind::ExternalFunction => "external_function",
            NodeKind::ExternalType => "external_type",
            NodeKind::ExternalVariable => "external_variable",
            NodeKind::Route => "route",
            NodeKind::Middleware => "middleware",
            NodeKind::Service => "service",
            NodeKind::Repository => "repository",
            NodeKind::Job => "job",
            NodeKind::Channel => "channel",
            NodeKind::Config => "config",
            NodeKind::Migration => "migration",
            NodeKind::Test => "test",
            NodeKind::Fixture => "fixture",
        }
    }

    pub fn group(&self) -> KindGroup {
        use NodeKind::*;
        match self {
            Directory | File | Module | Class | DataClass | Enum | EnumMember | Interface
            | Trait | Struct | Function | Method | Lambda | Parameter | Variable | Constant
            | Field | Import | Decorator | Comment | Docstring => KindGroup::Structural,
            Type | TypeAlias | TypeParameter | Signature | AssociatedType | Protocol => {
                KindGroup::TypeSystem
            }
            CfgBlock | Branch | Loop | Try | Catch | Finally | Return | Raise | Break
            | Continue | Assert | Yield => KindGroup::ControlFlow,
            Expression | Call | Assignment | BinaryOp | UnaryOp | BooleanOp | Comparison
            | Literal | Collection | Comprehension | ConditionalExpression | FieldAccess
            | Subscript | Index | ObjectInstantiation | LambdaDefinition | VariableRead
            | Await => KindGroup::Semantic,
            ExternalModule | ExternalClass | ExternalFunction | ExternalType
            | ExternalVariable => KindGroup::External,
            Route | Middleware | Service | Repository | Job | Channel | Config | Migration
            | Test | Fixture => KindGroup::Framework,
        }
    }

    pub fn is_external(&self) -> bool {
        self.group() == KindGroup::External
    }

    /// Kinds that define a named symbol (drive occurrences and the symbol index).
    pub fn is_symbol(&self) -> bool {
        matches!(
            self,
            NodeKind::Module
                | NodeKind::Class
                | NodeKind::DataClass
                | NodeKind::Enum
                | NodeKind::Interface
                | NodeKind::Trait
                | NodeKind::Struct
                | NodeKind::Function
                | NodeKind::Method
                | NodeKind::Lambda
                | NodeKind::Parameter
                | NodeKind::Variable
                | NodeKind::Constant
                | NodeKind::Field
        )
    }
}

/// Graph node. Produced by the structural IR builder, enriched by later
/// layers through `attrs`; never mutated after its owning layer publishes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub fqn: String,
    pub file_path: String,
    pub span: Span,
    pub language: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_span: Option<Span>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decorators: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_classes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_type_id: Option<String>,

    /// Open attribute map for layer-added facts (`lsp_type`, `callee_fqn`,
    /// `unresolved_ref`, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, serde_json::Value>,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, fqn: String, file_path: String, span: Span) -> Self {
        Self {
            id,
            kind,
            fqn,
            file_path,
            span,
            language: String::new(),
            name: None,
            module_path: None,
            parent_id: None,
            body_span: None,
            content_hash: None,
            docstring: None,
            decorators: None,
            base_classes: None,
            signature_id: None,
            declared_type_id: None,
            attrs: HashMap::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_module_path(mut self, module_path: impl Into<String>) -> Self {
        self.module_path = Some(module_path.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// True for placeholder nodes living in the `<external>` sentinel file.
    pub fn is_external(&self) -> bool {
        self.kind.is_external() && self.file_path == EXTERNAL_FILE
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_groups() {
        assert_eq!(NodeKind::Function.group(), KindGroup::Structural);
        assert_eq!(NodeKind::CfgBlock.group(), KindGroup::ControlFlow);
        assert_eq!(NodeKind::ExternalClass.group(), KindGroup::External);
        assert!(NodeKind::ExternalModule.is_external());
        assert!(!NodeKind::Module.is_external());
    }

    #[test]
    fn test_external_node_requires_sentinel_file() {
        let mut node = Node::new(
            "external_class:r:<external>:os.PathLike".to_string(),
            NodeKind::ExternalClass,
            "os.PathLike".to_string(),
            EXTERNAL_FILE.to_string(),
            Span::zero(),
        );
        assert!(node.is_external());

        node.file_path = "real.py".to_string();
        assert!(!node.is_external());
    }

    #[test]
    fn test_builder_style() {
        let node = Node::new(
            "function:r:f.py:m.foo".to_string(),
            NodeKind::Function,
            "m.foo".to_string(),
            "f.py".to_string(),
            Span::new(2, 0, 2, 14),
        )
        .with_language("python")
        .with_name("foo")
        .with_attr("is_async", serde_json::Value::Bool(false));

        assert_eq!(node.name.as_deref(), Some("foo"));
        assert_eq!(node.attrs.len(), 1);
    }
}
