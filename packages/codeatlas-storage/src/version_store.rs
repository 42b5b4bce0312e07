//! Index version records and atomic promotion.
//!
//! Layout: `<state_dir>/versions/<version_id>.json` plus a `latest.json`
//! pointer that is only rewritten (atomically) on successful completion, so
//! a failed or cancelled build leaves the last promoted version intact.

use crate::error::{Result, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexVersion {
    pub version_id: String,
    pub repo_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    pub file_count: usize,
    pub created_at: DateTime<Utc>,
    pub status: VersionStatus,
    pub duration_ms: u64,
    /// Per-file content hashes at this version; drives incremental change
    /// detection on the next run.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

impl IndexVersion {
    pub fn begin(repo_id: impl Into<String>) -> Self {
        Self {
            version_id: Uuid::new_v4().to_string(),
            repo_id: repo_id.into(),
            git_commit: None,
            file_count: 0,
            created_at: Utc::now(),
            status: VersionStatus::InProgress,
            duration_ms: 0,
            files: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LatestPointer {
    version_id: String,
}

pub struct VersionStore {
    versions_dir: PathBuf,
}

impl VersionStore {
    pub fn new(state_dir: &Path) -> Result<Self> {
        let versions_dir = state_dir.join("versions");
        fs::create_dir_all(&versions_dir)?;
        Ok(Self { versions_dir })
    }

    fn record_path(&self, version_id: &str) -> PathBuf {
        self.versions_dir.join(format!("{}.json", version_id))
    }

    fn latest_path(&self) -> PathBuf {
        self.versions_dir.join("latest.json")
    }

    pub fn save(&self, version: &IndexVersion) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(version)
            .map_err(|e| StorageError::Encode(e.to_string()))?;
        crate::ir_cache::write_atomically(&self.record_path(&version.version_id), &bytes, 0)?;
        Ok(())
    }

    pub fn load(&self, version_id: &str) -> Result<IndexVersion> {
        let bytes = fs::read(self.record_path(version_id))
            .map_err(|_| StorageError::VersionNotFound(version_id.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| StorageError::Encode(e.to_string()))
    }

    /// Atomically promote a completed version to "latest".
    pub fn promote(&self, version_id: &str) -> Result<()> {
        let pointer = LatestPointer {
            version_id: version_id.to_string(),
        };
        let bytes =
            serde_json::to_vec(&pointer).map_err(|e| StorageError::Encode(e.to_string()))?;
        crate::ir_cache::write_atomically(&self.latest_path(), &bytes, 1)?;
        Ok(())
    }

    /// The last promoted version, if any. A corrupt pointer or record reads
    /// as "no promoted version" rather than an error.
    pub fn current(&self) -> Option<IndexVersion> {
        let bytes = fs::read(self.latest_path()).ok()?;
        let pointer: LatestPointer = serde_json::from_slice(&bytes).ok()?;
        self.load(&pointer.version_id).ok()
    }

    pub fn list_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.versions_dir)? {
            let path = entry?.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem != "latest" && path.extension().and_then(|e| e.to_str()) == Some("json") {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = VersionStore::new(dir.path()).unwrap();

        let mut version = IndexVersion::begin("repo");
        version.file_count = 3;
        version.files.insert("a.py".to_string(), "hash-a".to_string());
        store.save(&version).unwrap();

        let loaded = store.load(&version.version_id).unwrap();
        assert_eq!(loaded, version);
    }

    #[test]
    fn test_promotion_is_explicit() {
        let dir = TempDir::new().unwrap();
        let store = VersionStore::new(dir.path()).unwrap();

        let mut version = IndexVersion::begin("repo");
        store.save(&version).unwrap();
        assert!(store.current().is_none());

        version.status = VersionStatus::Completed;
        store.save(&version).unwrap();
        store.promote(&version.version_id).unwrap();

        let current = store.current().unwrap();
        assert_eq!(current.version_id, version.version_id);
        assert_eq!(current.status, VersionStatus::Completed);
    }

    #[test]
    fn test_failed_build_leaves_promoted_version() {
        let dir = TempDir::new().unwrap();
        let store = VersionStore::new(dir.path()).unwrap();

        let mut good = IndexVersion::begin("repo");
        good.status = VersionStatus::Completed;
        store.save(&good).unwrap();
        store.promote(&good.version_id).unwrap();

        let mut bad = IndexVersion::begin("repo");
        bad.status = VersionStatus::Failed;
        store.save(&bad).unwrap();
        // no promote

        assert_eq!(store.current().unwrap().version_id, good.version_id);
        assert_eq!(store.list_ids().unwrap().len(), 2);
    }
}
