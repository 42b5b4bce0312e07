//! Snapshot-scoped graph store (CSR layout, frozen after build).

pub mod store;

pub use store::{EdgeRef, GraphStore};
