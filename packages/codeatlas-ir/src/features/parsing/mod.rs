//! Parsing feature: parser port + language-neutral CST + reference adapter.

pub mod domain;
pub mod ports;
mod tree_sitter_python;

pub use domain::{Language, ParseIssue, ParsedFile, SyntaxKind, SyntaxNode};
pub use ports::Parser;
pub use tree_sitter_python::PythonParser;
