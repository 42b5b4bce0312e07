//! Path-query DSL and its executor.
//!
//! ```no_run
//! use codeatlas_ir::features::graph_store::GraphStore;
//! use codeatlas_ir::features::query_engine::{Q, QueryEngine};
//! use codeatlas_ir::shared::models::EdgeKind;
//!
//! # fn demo(store: &GraphStore) {
//! let query = (Q::var("user") >> Q::func("execute"))
//!     .any_path()
//!     .via(EdgeKind::Dfg)
//!     .depth(6)
//!     .limit_paths(20);
//! let paths = QueryEngine::new(store).execute(&query);
//! println!("{} paths, complete={}", paths.len(), paths.complete);
//! # }
//! ```

pub mod query;
pub mod result;
pub mod selector;
pub mod traversal;

pub use query::{AnyPathQuery, Direction, EdgeClass, FlowExpr};
pub use result::{PathResult, PathSet, TruncationReason};
pub use selector::{Q, Selector};
pub use traversal::QueryEngine;
