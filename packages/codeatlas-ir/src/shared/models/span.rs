//! Source location types
//!
//! Lines are 1-based, columns 0-based. Spans are immutable and deduplicated
//! through a process-wide interning pool.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Span in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Zero span (0:0-0:0), used for synthetic nodes
    pub fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn contains(&self, other: &Span) -> bool {
        (self.start_line, self.start_col) <= (other.start_line, other.start_col)
            && (other.end_line, other.end_col) <= (self.end_line, self.end_col)
    }

    pub fn line_count(&self) -> u32 {
        if self.end_line >= self.start_line {
            self.end_line - self.start_line + 1
        } else {
            0
        }
    }

    /// Within-file validity: lines in `[1, file_line_count]`, start before end.
    pub fn is_valid(&self, file_line_count: u32) -> bool {
        self.start_line >= 1
            && self.end_line >= self.start_line
            && self.end_line <= file_line_count
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::zero()
    }
}

/// Handle into the process-wide span pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(pub u32);

/// Process-wide span interning pool.
///
/// Single-init, many-read. Writers go through dashmap's sharded locks; the
/// id → span table is append-only behind a short write lock.
pub struct SpanPool {
    by_span: DashMap<Span, SpanId, ahash::RandomState>,
    spans: RwLock<Vec<Span>>,
    next: AtomicU32,
}

static POOL: Lazy<SpanPool> = Lazy::new(SpanPool::new);

impl SpanPool {
    fn new() -> Self {
        Self {
            by_span: DashMap::with_hasher(ahash::RandomState::new()),
            spans: RwLock::new(Vec::new()),
            next: AtomicU32::new(0),
        }
    }

    /// Global pool accessor
    pub fn global() -> &'static SpanPool {
        &POOL
    }

    /// Intern a span, returning its stable id. Two spans intern to the same
    /// id iff their four integers are equal.
    pub fn intern(&self, span: Span) -> SpanId {
        if let Some(id) = self.by_span.get(&span) {
            return *id;
        }
        // Entry API keeps racing writers from minting two ids for one span.
        *self.by_span.entry(span).or_insert_with(|| {
            let id = SpanId(self.next.fetch_add(1, Ordering::Relaxed));
            let mut spans = self.spans.write();
            if spans.len() <= id.0 as usize {
                spans.resize(id.0 as usize + 1, Span::zero());
            }
            spans[id.0 as usize] = span;
            id
        })
    }

    pub fn resolve(&self, id: SpanId) -> Option<Span> {
        self.spans.read().get(id.0 as usize).copied()
    }

    pub fn len(&self) -> usize {
        self.by_span.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_span.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_contains_line() {
        let span = Span::new(10, 0, 20, 0);
        assert!(span.contains_line(10));
        assert!(span.contains_line(20));
        assert!(!span.contains_line(9));
        assert!(!span.contains_line(21));
    }

    #[test]
    fn test_span_contains_span() {
        let outer = Span::new(5, 0, 10, 0);
        assert!(outer.contains(&Span::new(6, 4, 9, 0)));
        assert!(outer.contains(&outer));
        assert!(!outer.contains(&Span::new(4, 0, 9, 0)));
        assert!(!outer.contains(&Span::new(6, 0, 11, 0)));
    }

    #[test]
    fn test_span_validity() {
        assert!(Span::new(1, 0, 3, 0).is_valid(3));
        assert!(!Span::new(0, 0, 3, 0).is_valid(3));
        assert!(!Span::new(1, 0, 4, 0).is_valid(3));
    }

    #[test]
    fn test_interning_dedups() {
        let pool = SpanPool::new();
        let a = pool.intern(Span::new(1, 0, 2, 5));
        let b = pool.intern(Span::new(1, 0, 2, 5));
        let c = pool.intern(Span::new(1, 0, 2, 6));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(pool.resolve(a), Some(Span::new(1, 0, 2, 5)));
        assert_eq!(pool.len(), 2);
    }
}
