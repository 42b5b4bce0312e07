//! Stable identifiers and content fingerprints.

use crate::shared::constants::{ENGINE_VERSION, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Node identifier. Stable across builds for unchanged `(kind, repo, file, fqn)`.
pub type NodeId = String;

/// 128-bit content fingerprint (SHA-256, truncated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 16]);

impl ContentHash {
    /// Fingerprint of file bytes, bound to the schema and engine versions:
    /// changing any of the three produces a different hash.
    pub fn of_file(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.update(SCHEMA_VERSION.to_le_bytes());
        hasher.update(ENGINE_VERSION.to_le_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 16];
        out.copy_from_slice(&digest[..16]);
        Self(out)
    }

    /// Fingerprint of an arbitrary string (declaration bodies, attr payloads).
    pub fn of_str(text: &str) -> Self {
        Self::of_file(text.as_bytes())
    }

    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(32);
        for b in &self.0 {
            s.push_str(&format!("{:02x}", b));
        }
        s
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Build the canonical node id `"<kind>:<repo_id>:<file>:<fqn>"`.
///
/// External references use the sentinel file `<external>` in the file slot.
pub fn node_id(kind: &str, repo_id: &str, file_path: &str, fqn: &str) -> NodeId {
    format!("{}:{}:{}:{}", kind, repo_id, file_path, fqn)
}

/// Build an edge id `"<kind>:<source>→<target>"`. Callers that may emit the
/// same pair twice disambiguate through [`EdgeIdGenerator`].
pub fn edge_id(kind: &str, source_id: &str, target_id: &str) -> String {
    format!("{}:{}→{}", kind, source_id, target_id)
}

/// Allocates edge ids, appending a monotonic `@n` suffix when the same
/// `(kind, source, target)` triple repeats within one file.
#[derive(Debug, Default)]
pub struct EdgeIdGenerator {
    seen: ahash::AHashMap<String, u32>,
}

impl EdgeIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, kind: &str, source_id: &str, target_id: &str) -> String {
        let base = edge_id(kind, source_id, target_id);
        let counter = self.seen.entry(base.clone()).or_insert(0);
        *counter += 1;
        if *counter == 1 {
            base
        } else {
            format!("{}@{}", base, *counter - 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_and_distinct() {
        let a = ContentHash::of_str("def foo(): pass");
        let b = ContentHash::of_str("def foo(): pass");
        let c = ContentHash::of_str("def bar(): pass");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 32);
    }

    #[test]
    fn test_node_id_format() {
        let id = node_id("function", "repo1", "src/app.py", "app.main");
        assert_eq!(id, "function:repo1:src/app.py:app.main");
    }

    #[test]
    fn test_edge_id_disambiguation() {
        let mut gen = EdgeIdGenerator::new();
        let first = gen.next("calls", "a", "b");
        let second = gen.next("calls", "a", "b");
        let other = gen.next("calls", "a", "c");
        assert_eq!(first, "calls:a→b");
        assert_eq!(second, "calls:a→b@1");
        assert_eq!(other, "calls:a→c");
    }
}
