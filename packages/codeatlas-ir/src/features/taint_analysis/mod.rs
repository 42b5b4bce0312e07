//! Taint analysis: YAML rule atoms, forward worklist propagation, findings.

pub mod engine;
pub mod rules;

pub use engine::TaintEngine;
pub use rules::{Atom, AtomCategory, RuleFlags, RuleSet};
