//! # Photour 📷
//!
//! Async thumbnail loading and two-tier bitmap caching for photo-trip
//! browsing.
//!
//! ## Overview
//!
//! Photour records trips as paths walked with geotagged photos. Browsing
//! one means filling a grid of thumbnails, a map of cluster markers, and a
//! full-screen viewer, all from the same set of source images, while the
//! user scrolls faster than any decode can finish. This crate is the
//! pipeline that keeps that honest: requests are bound to their targets,
//! superseded work is discarded, and decoded pixels are kept in a
//! byte-budgeted cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ImageLoader                           │
//! │   request(target, path, id, preset)  /  poll_completions()  │
//! └─────────────────────────────────────────────────────────────┘
//!            │                  │                   │
//!            ▼                  ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │   TaskBinder    │ │   Worker pool   │ │   BitmapCache   │
//! │                 │ │                 │ │                 │
//! │ • one task per  │ │ • decode off    │ │ • LRU memory    │
//! │   target        │ │   the caller's  │ │   tier (byte    │
//! │ • duplicate /   │ │   thread        │ │   budget)       │
//! │   supersede     │ │ • cooperative   │ │ • best-effort   │
//! │   detection     │ │   cancellation  │ │   disk tier     │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`cache`] — two-tier bitmap cache (memory LRU + disk)
//! - [`config`] — pipeline configuration
//! - [`decode`] — bounded decoding and embedded-preview extraction
//! - [`loader`] — worker pool, task binding, target registry
//! - [`paths`] — on-disk data locations
//!
//! ## Example
//!
//! ```no_run
//! use photour::{BoundsPreset, ImageLoader, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut loader = ImageLoader::new(&PipelineConfig::default())?;
//!     let target = loader.create_target();
//!     loader.request(
//!         target,
//!         std::path::Path::new("/photos/trip/001.jpg"),
//!         "trip-001",
//!         BoundsPreset::Thumbnail,
//!     );
//!     // ... later, from the UI loop:
//!     for event in loader.poll_completions() {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/photour/0.2.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::return_self_not_must_use)]

pub mod cache;
pub mod config;
pub mod decode;
pub mod loader;
pub mod paths;

// Re-export main types for convenience
pub use cache::{BitmapCache, CacheError, bitmap_cost};
pub use config::PipelineConfig;
pub use decode::{BoundsPreset, DecodeOrigin};
pub use loader::{
    CancelToken, ExistingTask, ImageLoader, LoadEvent, RequestOutcome, TargetHandle,
    TargetRegistry, TaskBinder,
};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
