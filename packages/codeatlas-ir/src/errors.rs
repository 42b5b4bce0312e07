//! Error types (re-exported from the shared models).

pub use crate::shared::models::{CodeatlasError, ErrorKind, Result};
