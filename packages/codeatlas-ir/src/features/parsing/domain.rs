//! Language-neutral CST types produced by the parser port.
//!
//! Downstream builders traverse these; nothing outside the adapter touches a
//! backend-specific tree.

use crate::shared::models::Span;

/// Source language tag, derived from the file extension at discovery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Language {
    Python,
    TypeScript,
    JavaScript,
    Go,
    Java,
    Rust,
    Unknown,
}

impl Language {
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" | "pyi" => Language::Python,
            "ts" | "tsx" => Language::TypeScript,
            "js" | "jsx" | "mjs" => Language::JavaScript,
            "go" => Language::Go,
            "java" => Language::Java,
            "rs" => Language::Rust,
            _ => Language::Unknown,
        }
    }

    pub fn from_path(path: &str) -> Self {
        path.rsplit('.')
            .next()
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Go => "go",
            Language::Java => "java",
            Language::Rust => "rust",
            Language::Unknown => "unknown",
        }
    }
}

/// Syntax node kind (language-neutral).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxKind {
    Module,

    // Definitions
    FunctionDef,
    ClassDef,
    LambdaDef,
    Decorated,

    // Declarations
    ParameterList,
    ImportDecl,
    ImportFromDecl,

    // Statements
    ExpressionStmt,
    AssignmentStmt,
    ReturnStmt,
    IfStmt,
    ElifClause,
    ElseClause,
    ForStmt,
    WhileStmt,
    TryStmt,
    ExceptClause,
    FinallyClause,
    WithStmt,
    RaiseStmt,
    BreakStmt,
    ContinueStmt,
    AssertStmt,
    Block,

    // Expressions
    CallExpr,
    NameExpr,
    AttributeExpr,
    SubscriptExpr,
    StringLiteral,
    Literal,
    BinaryExpr,
    BoolOpExpr,
    CompareExpr,
    ConditionalExpr,
    YieldExpr,
    AwaitExpr,

    // Anything else, tagged with the backend kind
    Other(String),
}

impl SyntaxKind {
    pub fn is_definition(&self) -> bool {
        matches!(
            self,
            SyntaxKind::FunctionDef | SyntaxKind::ClassDef | SyntaxKind::LambdaDef
        )
    }

    pub fn is_import(&self) -> bool {
        matches!(self, SyntaxKind::ImportDecl | SyntaxKind::ImportFromDecl)
    }

    /// Statements that terminate a basic block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            SyntaxKind::ReturnStmt
                | SyntaxKind::RaiseStmt
                | SyntaxKind::BreakStmt
                | SyntaxKind::ContinueStmt
        )
    }
}

/// Language-neutral syntax node.
#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: SyntaxKind,
    /// Backend grammar kind, kept for diagnostics.
    pub raw_kind: String,
    /// Field name this node occupies in its parent (`name`, `body`, ...).
    pub field: Option<String>,
    pub span: Span,
    /// Source text, captured for leaves and short expressions.
    pub text: Option<String>,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: SyntaxKind, raw_kind: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            raw_kind: raw_kind.into(),
            field: None,
            span,
            text: None,
            children: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn child_by_field(&self, field: &str) -> Option<&SyntaxNode> {
        self.children
            .iter()
            .find(|c| c.field.as_deref() == Some(field))
    }

    pub fn children_of_kind(&self, kind: &SyntaxKind) -> Vec<&SyntaxNode> {
        self.children.iter().filter(|c| &c.kind == kind).collect()
    }

    pub fn first_child_of_kind(&self, kind: &SyntaxKind) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| &c.kind == kind)
    }
}

/// One recoverable parse problem inside an otherwise usable tree.
#[derive(Debug, Clone)]
pub struct ParseIssue {
    pub message: String,
    pub span: Span,
}

/// Parser port output for one file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file_path: String,
    pub language: Language,
    pub source: String,
    /// `None` means unrecoverable: skip the file with a warning, never cache.
    pub root: Option<SyntaxNode>,
    pub issues: Vec<ParseIssue>,
    pub line_count: u32,
}

impl ParsedFile {
    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_path("src/a/b.ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("xyz"), Language::Unknown);
    }

    #[test]
    fn test_child_by_field() {
        let mut parent = SyntaxNode::new(SyntaxKind::FunctionDef, "function_definition", Span::zero());
        let mut name = SyntaxNode::new(SyntaxKind::NameExpr, "identifier", Span::zero());
        name.field = Some("name".to_string());
        name.text = Some("foo".to_string());
        parent.children.push(name);

        assert_eq!(parent.child_by_field("name").unwrap().text(), "foo");
        assert!(parent.child_by_field("body").is_none());
    }
}
