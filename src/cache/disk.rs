//! Best-effort persisted cache tier.
//!
//! Entries are PNG files named by the SHA-256 digest of the cache key, so
//! keys stay stable across runs and arbitrary key strings never leak into
//! file names.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use sha2::{Digest, Sha256};

use super::CacheError;

pub(super) struct DiskTier {
    dir: PathBuf,
}

impl DiskTier {
    pub fn new(dir: &Path) -> Result<Self, CacheError> {
        std::fs::create_dir_all(dir).map_err(|source| CacheError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{digest:x}.png"))
    }

    /// Read and decode the persisted entry for `key`, if any.
    pub fn read(&self, key: &str) -> Option<DynamicImage> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }
        image::open(&path).ok()
    }

    /// Persist `image` under `key`.
    pub fn write(&self, key: &str, image: &DynamicImage) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        image.save(&path).map_err(|source| CacheError::Persist {
            key: key.to_string(),
            source,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entry_path(key).exists()
    }
}
