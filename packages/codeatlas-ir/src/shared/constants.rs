//! Engine-wide version constants.
//!
//! Both versions participate in content hashing and cache keys; bumping
//! either invalidates every cached per-file artifact.

/// IR schema version. Bump on any change to the IRDocument wire shape.
pub const SCHEMA_VERSION: u64 = 3;

/// Engine version. Bump on any change to builder semantics that alters
/// produced artifacts for identical inputs.
pub const ENGINE_VERSION: u64 = 7;

/// Sentinel file path for nodes that stand in for unresolved symbols.
pub const EXTERNAL_FILE: &str = "<external>";
