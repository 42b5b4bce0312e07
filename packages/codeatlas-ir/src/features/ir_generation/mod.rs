//! Structural IR generation: CST → per-file nodes, edges and occurrences.

pub mod ir_builder;
pub mod occurrences;

pub use ir_builder::{module_path_for, StructuralIrBuilder};
pub use occurrences::OccurrenceCollector;
