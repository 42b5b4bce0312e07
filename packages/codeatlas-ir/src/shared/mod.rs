//! Shared models and engine-wide constants.

pub mod constants;
pub mod models;
