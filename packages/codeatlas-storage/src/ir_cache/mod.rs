//! Content-addressed per-file IR artifact cache.
//!
//! Memory tier (LRU behind a single mutex, not process-shared) over a disk
//! tier (one file per key, multi-process safe via tmp-write + atomic
//! rename; racing writers are last-writer-wins with no corruption).

pub mod entry;

use crate::error::Result;
use codeatlas_ir::IRDocument;
use lru::LruCache;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub use entry::cache_key;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub memory_capacity: usize,
    pub cache_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: 2048,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub writes: u64,
}

/// Two-tier IR cache.
pub struct IrCache {
    memory: Mutex<LruCache<String, Arc<IRDocument>>>,
    disk_dir: Option<PathBuf>,
    tmp_counter: AtomicU64,
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
}

impl IrCache {
    pub fn new(config: CacheConfig) -> Result<Self> {
        let disk_dir = match config.cache_dir {
            Some(dir) => {
                let ir_dir = dir.join("ir");
                fs::create_dir_all(&ir_dir)?;
                Some(ir_dir)
            }
            None => None,
        };
        let capacity =
            NonZeroUsize::new(config.memory_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            memory: Mutex::new(LruCache::new(capacity)),
            disk_dir,
            tmp_counter: AtomicU64::new(0),
            memory_hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        })
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        self.disk_dir.as_ref().map(|d| d.join(format!("{}.bin", key)))
    }

    /// Fetch a cached artifact. Disk corruption of any flavor is a miss.
    pub fn get(&self, key: &str) -> Option<Arc<IRDocument>> {
        if let Some(doc) = self.memory.lock().get(key) {
            self.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Some(Arc::clone(doc));
        }

        if let Some(path) = self.path_for(key) {
            if let Ok(bytes) = fs::read(&path) {
                if let Some(doc) = entry::decode(&bytes) {
                    self.disk_hits.fetch_add(1, Ordering::Relaxed);
                    let doc = Arc::new(doc);
                    self.memory.lock().put(key.to_string(), Arc::clone(&doc));
                    return Some(doc);
                }
                debug!(key, "corrupt cache entry treated as miss");
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store an artifact in both tiers. Disk writes go through a unique tmp
    /// file and an atomic rename; a lost race simply means the other
    /// writer's identical entry wins.
    pub fn put(&self, key: &str, doc: Arc<IRDocument>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.memory.lock().put(key.to_string(), Arc::clone(&doc));

        if let Some(path) = self.path_for(key) {
            let bytes = entry::encode(&doc)
                .map_err(crate::error::StorageError::Encode)?;
            write_atomically(&path, &bytes, self.tmp_counter.fetch_add(1, Ordering::Relaxed))?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
        }
    }
}

/// Tmp-write + fsync + rename. The tmp name embeds pid and a counter so
/// concurrent writers (threads or processes) never collide.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8], counter: u64) -> Result<()> {
    let tmp = path.with_extension(format!("tmp.{}.{}", std::process::id(), counter));
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
