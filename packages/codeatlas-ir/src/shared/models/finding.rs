//! Vulnerability findings and regression diffing.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// One step on a source→sink path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowStep {
    /// Variable or expression id.
    pub id: String,
    /// Human-facing label, e.g. `q@assign`, `execute@sink`.
    pub label: String,
    pub line: u32,
}

/// Vulnerability report emitted by the taint engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub kind: String,
    pub severity: Severity,
    pub file_path: String,
    /// Source call that introduced the taint.
    pub source: FlowStep,
    /// Sink call the taint reached.
    pub sink: FlowStep,
    pub sink_line: u32,
    /// Full source→sink path.
    pub path: Vec<FlowStep>,
    /// Sanitizer calls observed near (but not on) the path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sanitizer_evidence: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwe: Option<String>,
}

impl Finding {
    /// Regression address: two findings are "the same" when rule, file and
    /// sink line agree, regardless of path details.
    pub fn address(&self) -> (String, String, u32) {
        (self.rule_id.clone(), self.file_path.clone(), self.sink_line)
    }
}

/// Diff of two finding sets. `new.is_empty()` is the regression-gate
/// acceptance criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingsDiff {
    pub new: Vec<Finding>,
    pub removed: Vec<Finding>,
    pub unchanged: Vec<Finding>,
    pub passed: bool,
}

/// Compare a baseline finding set against the current one by address.
pub fn compare_findings(baseline: &[Finding], current: &[Finding]) -> FindingsDiff {
    let base_addrs: HashSet<_> = baseline.iter().map(Finding::address).collect();
    let curr_addrs: HashSet<_> = current.iter().map(Finding::address).collect();

    let new: Vec<Finding> = current
        .iter()
        .filter(|f| !base_addrs.contains(&f.address()))
        .cloned()
        .collect();
    let removed: Vec<Finding> = baseline
        .iter()
        .filter(|f| !curr_addrs.contains(&f.address()))
        .cloned()
        .collect();
    let unchanged: Vec<Finding> = current
        .iter()
        .filter(|f| base_addrs.contains(&f.address()))
        .cloned()
        .collect();

    let passed = new.is_empty();
    FindingsDiff {
        new,
        removed,
        unchanged,
        passed,
    }
}
