//! Two-tier bitmap cache.
//!
//! A byte-budgeted LRU memory tier backed by an optional best-effort disk
//! tier. Both tiers live behind one `BitmapCache` handle; there is no side
//! door to either tier.

mod disk;
mod memory;

pub use memory::bitmap_cost;

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::DynamicImage;
use thiserror::Error;

use disk::DiskTier;
use memory::MemoryTier;

/// Errors from the persisted cache tier.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache directory could not be created
    #[error("failed to create cache directory {path}")]
    CreateDir {
        /// Directory that could not be created
        path: std::path::PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A cache entry could not be persisted
    #[error("failed to persist cache entry {key}")]
    Persist {
        /// Cache key of the entry
        key: String,
        /// Underlying encode/write error
        #[source]
        source: image::ImageError,
    },
}

/// Thread-safe two-tier bitmap cache.
///
/// Cheap to clone; clones share the same tiers.
#[derive(Clone)]
pub struct BitmapCache {
    /// Memory tier and its byte accounting, guarded together so the
    /// aggregate size stays consistent under concurrent eviction
    memory: Arc<Mutex<MemoryTier>>,
    disk: Option<Arc<DiskTier>>,
}

impl BitmapCache {
    /// Create a memory-only cache with the given byte budget.
    #[must_use]
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            memory: Arc::new(Mutex::new(MemoryTier::new(budget_bytes))),
            disk: None,
        }
    }

    /// Create a cache with both tiers, persisting under `dir`.
    pub fn with_disk(budget_bytes: usize, dir: &Path) -> Result<Self, CacheError> {
        Ok(Self {
            memory: Arc::new(Mutex::new(MemoryTier::new(budget_bytes))),
            disk: Some(Arc::new(DiskTier::new(dir)?)),
        })
    }

    /// Get a bitmap from the cache.
    ///
    /// Memory tier first; on a miss the disk tier is consulted and a hit
    /// is promoted into the memory tier.
    pub fn get(&self, key: &str) -> Option<Arc<DynamicImage>> {
        if let Some(image) = self.memory.lock().unwrap().get(key) {
            return Some(image);
        }

        let disk = self.disk.as_ref()?;
        let image = Arc::new(disk.read(key)?);
        tracing::debug!("promoting {key} from disk tier");
        self.memory.lock().unwrap().insert(key, Arc::clone(&image));
        Some(image)
    }

    /// Store a bitmap in the cache.
    ///
    /// Inserts into the memory tier (evicting down to budget), then
    /// persists to the disk tier in the background. A disk-write failure
    /// is logged and swallowed; the put itself never fails.
    pub fn put(&self, key: &str, image: Arc<DynamicImage>) {
        self.memory.lock().unwrap().insert(key, Arc::clone(&image));

        if let Some(disk) = &self.disk {
            let disk = Arc::clone(disk);
            let key = key.to_string();
            let write = move || {
                if let Err(e) = disk.write(&key, &image) {
                    tracing::warn!("disk cache write failed: {e}");
                }
            };
            // Persist off-thread when a runtime is available (tests may
            // call this without one)
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn_blocking(write);
                }
                Err(_) => write(),
            }
        }
    }

    /// Check whether either tier holds `key`.
    pub fn contains(&self, key: &str) -> bool {
        if self.memory.lock().unwrap().contains(key) {
            return true;
        }
        self.disk.as_ref().is_some_and(|disk| disk.contains(key))
    }

    /// Drop every memory-tier entry. Disk entries are untouched.
    pub fn clear_memory(&self) {
        self.memory.lock().unwrap().clear();
    }

    /// Number of bitmaps resident in the memory tier.
    pub fn len(&self) -> usize {
        self.memory.lock().unwrap().len()
    }

    /// Check if the memory tier is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Aggregate memory-tier size in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.memory.lock().unwrap().total_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn bitmap(width: u32, height: u32) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgba8(width, height))
    }

    #[test]
    fn test_put_then_get_same_image() {
        let cache = BitmapCache::new(1024 * 1024);
        let img = bitmap(10, 10);
        cache.put("k", Arc::clone(&img));
        assert!(Arc::ptr_eq(&img, &cache.get("k").unwrap()));
    }

    #[test]
    fn test_budget_eviction_across_puts() {
        // Memory-only so the evicted key is truly gone
        let cache = BitmapCache::new(500);
        cache.put("k1", bitmap(10, 10)); // 400 bytes
        cache.put("k2", bitmap(11, 10)); // 440 bytes, busts the budget
        assert!(cache.get("k1").is_none());
        let k2 = cache.get("k2").unwrap();
        assert_eq!((k2.width(), k2.height()), (11, 10));
        assert!(cache.memory_bytes() <= 500);
    }

    #[test]
    fn test_disk_tier_promotion() {
        let dir = tempdir().unwrap();
        let cache = BitmapCache::with_disk(1024 * 1024, dir.path()).unwrap();

        cache.put("trip-7", bitmap(12, 9));
        cache.clear_memory();
        assert!(cache.is_empty());

        // Miss in memory, hit on disk, promoted back
        let img = cache.get("trip-7").unwrap();
        assert_eq!((img.width(), img.height()), (12, 9));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_absent_key() {
        let cache = BitmapCache::new(1024);
        assert!(cache.get("nope").is_none());
        assert!(!cache.contains("nope"));
    }
}
