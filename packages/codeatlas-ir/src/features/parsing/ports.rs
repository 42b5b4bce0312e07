//! Parser port (interface)
//!
//! The core consumes syntax trees through this trait; the backend choice
//! (tree-sitter, LSP daemon) stays behind it.

use super::domain::{Language, ParsedFile};
use crate::shared::models::Result;

/// Parser abstraction. Implementations must be robust (recover from syntax
/// errors where possible) and deterministic, and may hold no global state
/// the core depends on.
pub trait Parser: Send + Sync {
    /// Parse one file. A recoverable syntax error still yields a tree plus
    /// issues; an unrecoverable one yields `root: None`.
    fn parse(&self, file_path: &str, source: &str) -> Result<ParsedFile>;

    fn supports_extension(&self, ext: &str) -> bool;

    fn language(&self) -> Language;
}
