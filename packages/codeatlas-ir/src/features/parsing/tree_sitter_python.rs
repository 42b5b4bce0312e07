//! Reference parser adapter: tree-sitter, Python grammar.
//!
//! Lowers the backend tree into the language-neutral `SyntaxNode` shape at
//! parse time so nothing downstream sees tree-sitter types.

use super::domain::{Language, ParseIssue, ParsedFile, SyntaxKind, SyntaxNode};
use super::ports::Parser;
use crate::shared::models::{CodeatlasError, Result, Span};
use tree_sitter::{Node as TsNode, Parser as TsParser};

/// Captured-text cutoff. Identifiers, dotted names and small expressions fit;
/// bodies do not.
const MAX_CAPTURED_TEXT: usize = 160;

pub struct PythonParser;

impl PythonParser {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser for PythonParser {
    fn parse(&self, file_path: &str, source: &str) -> Result<ParsedFile> {
        // tree-sitter parsers are not Sync; one per call keeps the adapter
        // shareable across rayon workers.
        let mut parser = TsParser::new();
        let language = tree_sitter_python::language();
        parser
            .set_language(&language)
            .map_err(|e| CodeatlasError::parse(format!("grammar load failed: {}", e)))?;

        let line_count = source.split('\n').count() as u32;

        let tree = match parser.parse(source, None) {
            Some(tree) => tree,
            None => {
                return Ok(ParsedFile {
                    file_path: file_path.to_string(),
                    language: Language::Python,
                    source: source.to_string(),
                    root: None,
                    issues: vec![ParseIssue {
                        message: "unrecoverable parse failure".to_string(),
                        span: Span::zero(),
                    }],
                    line_count,
                });
            }
        };

        let ts_root = tree.root_node();
        let mut issues = Vec::new();
        collect_issues(ts_root, &mut issues);

        let root = lower(ts_root, source);

        Ok(ParsedFile {
            file_path: file_path.to_string(),
            language: Language::Python,
            source: source.to_string(),
            root: Some(root),
            issues,
            line_count,
        })
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext, "py" | "pyi")
    }

    fn language(&self) -> Language {
        Language::Python
    }
}

fn to_span(node: &TsNode) -> Span {
    let start = node.start_position();
    let end = node.end_position();
    Span::new(
        start.row as u32 + 1,
        start.column as u32,
        end.row as u32 + 1,
        end.column as u32,
    )
}

fn collect_issues(node: TsNode, issues: &mut Vec<ParseIssue>) {
    if node.is_error() {
        issues.push(ParseIssue {
            message: "syntax error".to_string(),
            span: to_span(&node),
        });
        return;
    }
    if node.is_missing() {
        issues.push(ParseIssue {
            message: format!("missing {}", node.kind()),
            span: to_span(&node),
        });
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            collect_issues(child, issues);
        }
    }
}

fn lower(node: TsNode, source: &str) -> SyntaxNode {
    let mut out = SyntaxNode::new(map_kind(node.kind()), node.kind(), to_span(&node));

    if node.end_byte() - node.start_byte() <= MAX_CAPTURED_TEXT {
        out.text = node
            .utf8_text(source.as_bytes())
            .ok()
            .map(|t| t.to_string());
    }

    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if child.is_named() && !child.is_extra() {
                let mut lowered = lower(child, source);
                lowered.field = cursor.field_name().map(|f| f.to_string());
                out.children.push(lowered);
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }

    out
}

fn map_kind(raw: &str) -> SyntaxKind {
    match raw {
        "module" => SyntaxKind::Module,
        "function_definition" => SyntaxKind::FunctionDef,
        "class_definition" => SyntaxKind::ClassDef,
        "decorated_definition" => SyntaxKind::Decorated,
        "lambda" => SyntaxKind::LambdaDef,
        "parameters" | "lambda_parameters" => SyntaxKind::ParameterList,
        "import_statement" => SyntaxKind::ImportDecl,
        "import_from_statement" => SyntaxKind::ImportFromDecl,
        "expression_statement" => SyntaxKind::ExpressionStmt,
        "assignment" | "augmented_assignment" => SyntaxKind::AssignmentStmt,
        "return_statement" => SyntaxKind::ReturnStmt,
        "if_statement" => SyntaxKind::IfStmt,
        "elif_clause" => SyntaxKind::ElifClause,
        "else_clause" => SyntaxKind::ElseClause,
        "for_statement" => SyntaxKind::ForStmt,
        "while_statement" => SyntaxKind::WhileStmt,
        "try_statement" => SyntaxKind::TryStmt,
        "except_clause" => SyntaxKind::ExceptClause,
        "finally_clause" => SyntaxKind::FinallyClause,
        "with_statement" => SyntaxKind::WithStmt,
        "raise_statement" => SyntaxKind::RaiseStmt,
        "break_statement" => SyntaxKind::BreakStmt,
        "continue_statement" => SyntaxKind::ContinueStmt,
        "assert_statement" => SyntaxKind::AssertStmt,
        "block" => SyntaxKind::Block,
        "call" => SyntaxKind::CallExpr,
        "identifier" => SyntaxKind::NameExpr,
        "attribute" => SyntaxKind::AttributeExpr,
        "subscript" => SyntaxKind::SubscriptExpr,
        "string" => SyntaxKind::StringLiteral,
        "integer" | "float" | "true" | "false" | "none" => SyntaxKind::Literal,
        "binary_operator" => SyntaxKind::BinaryExpr,
        "boolean_operator" => SyntaxKind::BoolOpExpr,
        "comparison_operator" => SyntaxKind::CompareExpr,
        "conditional_expression" => SyntaxKind::ConditionalExpr,
        "yield" => SyntaxKind::YieldExpr,
        "await" => SyntaxKind::AwaitExpr,
        other => SyntaxKind::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_function() {
        let parser = PythonParser::new();
        let parsed = parser
            .parse("test.py", "def foo():\n    pass\n")
            .unwrap();

        let root = parsed.root.unwrap();
        assert_eq!(root.kind, SyntaxKind::Module);
        let func = root.first_child_of_kind(&SyntaxKind::FunctionDef).unwrap();
        assert_eq!(func.child_by_field("name").unwrap().text(), "foo");
        assert_eq!(func.span.start_line, 1);
        assert!(parsed.issues.is_empty());
    }

    #[test]
    fn test_parse_empty_file() {
        let parser = PythonParser::new();
        let parsed = parser.parse("empty.py", "").unwrap();
        let root = parsed.root.unwrap();
        assert!(root.children.is_empty());
        assert_eq!(parsed.line_count, 1);
    }

    #[test]
    fn test_parse_recovers_from_error() {
        let parser = PythonParser::new();
        let parsed = parser
            .parse("bad.py", "def broken(:\n    pass\n\ndef ok():\n    pass\n")
            .unwrap();

        assert!(parsed.has_errors());
        let root = parsed.root.unwrap();
        // The recovered tree still carries the valid sibling.
        assert!(!root.children.is_empty());
    }

    #[test]
    fn test_field_names_survive_lowering() {
        let parser = PythonParser::new();
        let parsed = parser
            .parse("t.py", "class A(Base):\n    def m(self):\n        return 1\n")
            .unwrap();

        let root = parsed.root.unwrap();
        let class = root.first_child_of_kind(&SyntaxKind::ClassDef).unwrap();
        assert_eq!(class.child_by_field("name").unwrap().text(), "A");
        assert!(class.child_by_field("superclasses").is_some());
        assert!(class.child_by_field("body").is_some());
    }
}
