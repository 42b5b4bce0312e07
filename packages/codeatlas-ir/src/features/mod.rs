//! Feature modules, one vertical slice per pipeline layer.

pub mod cross_file;
pub mod data_flow;
pub mod flow_graph;
pub mod graph_store;
pub mod ir_generation;
pub mod parsing;
pub mod query_engine;
pub mod retrieval;
pub mod taint_analysis;
pub mod type_enrichment;
