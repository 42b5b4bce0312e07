//! Persisted taint findings for regression comparison.
//!
//! Layout: `<state_dir>/findings/<execution_id>.json`.

use crate::error::{Result, StorageError};
use codeatlas_ir::shared::models::{compare_findings, Finding, FindingsDiff};
use std::fs;
use std::path::{Path, PathBuf};

pub struct FindingsStore {
    findings_dir: PathBuf,
}

impl FindingsStore {
    pub fn new(state_dir: &Path) -> Result<Self> {
        let findings_dir = state_dir.join("findings");
        fs::create_dir_all(&findings_dir)?;
        Ok(Self { findings_dir })
    }

    fn path_for(&self, execution_id: &str) -> PathBuf {
        self.findings_dir.join(format!("{}.json", execution_id))
    }

    pub fn save(&self, execution_id: &str, findings: &[Finding]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(findings)
            .map_err(|e| StorageError::Encode(e.to_string()))?;
        crate::ir_cache::write_atomically(&self.path_for(execution_id), &bytes, 0)?;
        Ok(())
    }

    pub fn get_findings(&self, execution_id: &str) -> Result<Vec<Finding>> {
        let bytes = fs::read(self.path_for(execution_id))
            .map_err(|_| StorageError::FindingsNotFound(execution_id.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Encode(e.to_string()))
    }

    /// Regression gate: diff two stored executions. An empty `new` set means
    /// the gate passes.
    pub fn compare(&self, baseline_id: &str, current_id: &str) -> Result<FindingsDiff> {
        let baseline = self.get_findings(baseline_id)?;
        let current = self.get_findings(current_id)?;
        Ok(compare_findings(&baseline, &current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeatlas_ir::shared::models::{FlowStep, Severity};
    use tempfile::TempDir;

    fn finding(rule: &str, line: u32) -> Finding {
        Finding {
            rule_id: rule.to_string(),
            kind: "SQL_INJECTION".to_string(),
            severity: Severity::High,
            file_path: "app.py".to_string(),
            source: FlowStep {
                id: "s".to_string(),
                label: "q@assign".to_string(),
                line: 1,
            },
            sink: FlowStep {
                id: "k".to_string(),
                label: "execute@sink".to_string(),
                line,
            },
            sink_line: line,
            path: vec![],
            sanitizer_evidence: vec![],
            cwe: Some("CWE-89".to_string()),
        }
    }

    #[test]
    fn test_save_and_compare() {
        let dir = TempDir::new().unwrap();
        let store = FindingsStore::new(dir.path()).unwrap();

        store.save("base", &[finding("r1", 10)]).unwrap();
        store.save("curr", &[finding("r1", 10), finding("r2", 20)]).unwrap();

        let diff = store.compare("base", "curr").unwrap();
        assert_eq!(diff.new.len(), 1);
        assert_eq!(diff.unchanged.len(), 1);
        assert!(!diff.passed);

        let clean = store.compare("curr", "curr").unwrap();
        assert!(clean.passed);
    }

    #[test]
    fn test_missing_execution_errors() {
        let dir = TempDir::new().unwrap();
        let store = FindingsStore::new(dir.path()).unwrap();
        assert!(store.get_findings("ghost").is_err());
    }
}
