//! Data-flow graph construction per function.

pub mod dfg_builder;

pub use dfg_builder::{DfgBuilder, DfgOutput};
