//! Control-flow graph construction per function.

pub mod cfg_builder;

pub use cfg_builder::CfgBuilder;
