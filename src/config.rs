//! Configuration module for the Photour image pipeline

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of background decode workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Byte budget for the in-memory bitmap cache tier
    #[serde(default = "default_memory_budget")]
    pub memory_budget_bytes: usize,

    /// Whether to persist decoded bitmaps to the disk tier
    #[serde(default = "default_disk_cache")]
    pub disk_cache: bool,

    /// Override for the disk tier directory (defaults to
    /// ~/.cache/photour/thumbnails)
    #[serde(default)]
    pub disk_cache_dir: Option<PathBuf>,
}

fn default_workers() -> usize {
    4
}

fn default_memory_budget() -> usize {
    32 * 1024 * 1024 // 32 MiB
}

fn default_disk_cache() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            memory_budget_bytes: default_memory_budget(),
            disk_cache: default_disk_cache(),
            disk_cache_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        crate::paths::config_path()
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}
