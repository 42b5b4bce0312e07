//! Occurrence records: identifier appearances with roles.
//!
//! Occurrences drive find-references and the retrieval symbol index. Order is
//! deterministic: file order, then span order.

use super::span::Span;
use serde::{Deserialize, Serialize};

/// Role of one identifier appearance.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccurrenceRole {
    Def = 1,
    Ref = 2,
    Import = 4,
    Write = 8,
}

impl OccurrenceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccurrenceRole::Def => "def",
            OccurrenceRole::Ref => "ref",
            OccurrenceRole::Import => "import",
            OccurrenceRole::Write => "write",
        }
    }
}

/// One identifier appearance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub span: Span,
    pub symbol_fqn: String,
    pub role: OccurrenceRole,
    pub file_path: String,
}

impl Occurrence {
    pub fn new(span: Span, symbol_fqn: impl Into<String>, role: OccurrenceRole, file_path: impl Into<String>) -> Self {
        Self {
            span,
            symbol_fqn: symbol_fqn.into(),
            role,
            file_path: file_path.into(),
        }
    }
}

/// Sort occurrences into their canonical order (span order within one file).
pub fn sort_occurrences(occurrences: &mut [Occurrence]) {
    occurrences.sort_by(|a, b| {
        (a.file_path.as_str(), a.span.start_line, a.span.start_col)
            .cmp(&(b.file_path.as_str(), b.span.start_line, b.span.start_col))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let mut occs = vec![
            Occurrence::new(Span::new(6, 0, 6, 3), "m.foo", OccurrenceRole::Ref, "a.py"),
            Occurrence::new(Span::new(2, 4, 2, 7), "m.foo", OccurrenceRole::Def, "a.py"),
            Occurrence::new(Span::new(5, 0, 5, 3), "m.foo", OccurrenceRole::Ref, "a.py"),
        ];
        sort_occurrences(&mut occs);
        let lines: Vec<u32> = occs.iter().map(|o| o.span.start_line).collect();
        assert_eq!(lines, vec![2, 5, 6]);
        assert_eq!(occs[0].role, OccurrenceRole::Def);
    }
}
