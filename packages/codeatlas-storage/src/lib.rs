//! codeatlas-storage: content-addressed IR cache, index-version records and
//! persisted findings.
//!
//! All persisted state is file-based with atomic tmp-write + rename; SQL and
//! vector backends stay behind ports owned by their consumers.

pub mod error;
pub mod findings_store;
pub mod graph_snapshot;
pub mod ir_cache;
pub mod version_store;

pub use error::{Result, StorageError};
pub use findings_store::FindingsStore;
pub use graph_snapshot::GraphSnapshotStore;
pub use ir_cache::{cache_key, CacheConfig, CacheStats, IrCache};
pub use version_store::{IndexVersion, VersionStatus, VersionStore};
