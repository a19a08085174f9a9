//! Common paths for Photour data storage
//!
//! - ~/.config/photour/config.toml - pipeline configuration
//! - ~/.cache/photour/thumbnails/ - persisted bitmap cache tier

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Get the Photour cache directory (~/.cache/photour/)
pub fn photour_cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .context("Could not determine cache directory")?;
    let dir = base.join("photour");
    fs::create_dir_all(&dir).context("Failed to create photour cache directory")?;
    Ok(dir)
}

/// Get the persisted thumbnail directory (~/.cache/photour/thumbnails/)
pub fn thumbnail_cache_dir() -> Result<PathBuf> {
    let dir = photour_cache_dir()?.join("thumbnails");
    fs::create_dir_all(&dir).context("Failed to create thumbnail cache directory")?;
    Ok(dir)
}

/// Get the config file path (~/.config/photour/config.toml)
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("photour");
    Ok(config_dir.join("config.toml"))
}
