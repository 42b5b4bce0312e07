//! Cross-file resolution: global symbol aggregation, import rewriting and
//! the file dependency graph.

pub mod dep_graph;
pub mod global_context;
pub mod resolver;

pub use dep_graph::{DependencyGraph, ImpactResult};
pub use global_context::GlobalContext;
pub use resolver::{CrossFileResolver, ResolveStats};
