//! Async bitmap loading pipeline.
//!
//! A fixed pool of background workers runs the decode fallback chain; the
//! owner of the [`ImageLoader`] polls completions from its single thread,
//! which models the UI scheduling context. Staleness is resolved by
//! identity check at completion time: a result is applied to its target
//! only when the task is uncancelled and the binder still names it.

mod binder;
mod target;
mod task;

pub use binder::{ExistingTask, TaskBinder};
pub use target::{TargetHandle, TargetRegistry};
pub use task::CancelToken;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use image::DynamicImage;
use tokio::sync::mpsc;

use crate::cache::BitmapCache;
use crate::config::PipelineConfig;
use crate::decode::{BoundsPreset, DecodeOrigin};

use binder::BoundTask;
use task::{Completion, Job};

/// What became of a load request at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new task was queued
    Started,
    /// The same source is already in flight for this target
    DuplicateInFlight,
    /// The target handle is dead; nothing was queued
    DeadTarget,
}

/// Completion-side event, returned by [`ImageLoader::poll_completions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// A bitmap was applied to its target
    Applied {
        /// Target the bitmap was applied to
        target: TargetHandle,
        /// Source id of the request
        source_id: String,
        /// Which strategy produced the bitmap
        origin: DecodeOrigin,
    },
    /// A result arrived for a superseded, cancelled, or destroyed target
    /// and was dropped without touching it
    Discarded {
        /// Target of the stale request
        target: TargetHandle,
        /// Source id of the stale request
        source_id: String,
    },
    /// Every decode strategy came up empty; the target was left unchanged
    Failed {
        /// Target of the failed request
        target: TargetHandle,
        /// Source id of the failed request
        source_id: String,
    },
}

/// Facade over the worker pool, cache, binder, and target registry.
pub struct ImageLoader {
    targets: Arc<TargetRegistry>,
    binder: TaskBinder,
    cache: BitmapCache,
    job_tx: mpsc::UnboundedSender<Job>,
    done_rx: mpsc::UnboundedReceiver<Completion>,
    next_task: AtomicU64,
}

impl ImageLoader {
    /// Build a loader from config.
    ///
    /// Must be called within a tokio runtime; the worker pool is spawned
    /// here. Dropping the loader shuts the pool down.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let cache = if config.disk_cache {
            let dir = match &config.disk_cache_dir {
                Some(dir) => dir.clone(),
                None => crate::paths::thumbnail_cache_dir()?,
            };
            BitmapCache::with_disk(config.memory_budget_bytes, &dir)?
        } else {
            BitmapCache::new(config.memory_budget_bytes)
        };
        Ok(Self::with_cache(cache, config.workers))
    }

    /// Build a loader over an existing cache.
    #[must_use]
    pub fn with_cache(cache: BitmapCache, workers: usize) -> Self {
        let targets = Arc::new(TargetRegistry::new());
        let binder = TaskBinder::new(Arc::clone(&targets));
        let (job_tx, done_rx) = task::spawn_pool(workers, cache.clone());
        Self {
            targets,
            binder,
            cache,
            job_tx,
            done_rx,
            next_task: AtomicU64::new(0),
        }
    }

    /// Register a new image target.
    pub fn create_target(&self) -> TargetHandle {
        self.targets.create()
    }

    /// Destroy a target, cancelling whatever is in flight for it.
    pub fn destroy_target(&self, target: TargetHandle) {
        self.binder.release(target);
        self.targets.destroy(target);
    }

    /// The bitmap currently applied to `target`, if any.
    pub fn applied(&self, target: TargetHandle) -> Option<Arc<DynamicImage>> {
        self.targets.applied(target)
    }

    /// The shared bitmap cache.
    pub fn cache(&self) -> &BitmapCache {
        &self.cache
    }

    /// The task binder (exposed for staleness queries).
    pub fn binder(&self) -> &TaskBinder {
        &self.binder
    }

    /// Request a bitmap for `target`.
    ///
    /// `source_id` doubles as the cache key. A request identical to the
    /// one in flight is a no-op; a different one supersedes it.
    pub fn request(
        &self,
        target: TargetHandle,
        path: &Path,
        source_id: &str,
        preset: BoundsPreset,
    ) -> RequestOutcome {
        if !self.targets.is_live(target) {
            return RequestOutcome::DeadTarget;
        }

        match self.binder.check_existing(source_id, target) {
            ExistingTask::Duplicate => return RequestOutcome::DuplicateInFlight,
            ExistingTask::Fresh | ExistingTask::Superseded => {}
        }

        let task_id = self.next_task.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        self.binder.bind(
            target,
            BoundTask {
                task_id,
                source_id: source_id.to_string(),
                cancel: cancel.clone(),
            },
        );

        let sent = self.job_tx.send(Job {
            task_id,
            target,
            path: path.to_path_buf(),
            source_id: source_id.to_string(),
            preset,
            cancel,
        });
        if sent.is_err() {
            // Pool is gone; nothing will complete this task
            self.binder.unbind_if(target, task_id);
            tracing::warn!("decode pool is down, dropping request for {source_id}");
        }
        RequestOutcome::Started
    }

    /// Drain finished tasks, applying still-valid results to their
    /// targets (non-blocking).
    ///
    /// A result is applied only when its task is uncancelled, the binder
    /// still names it, and the target is live. Write-through to the cache
    /// happens after application, and also for superseded results, so a
    /// stale decode still warms the cache.
    pub fn poll_completions(&mut self) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.done_rx.try_recv() {
            events.push(self.settle(completion));
        }
        events
    }

    fn settle(&self, completion: Completion) -> LoadEvent {
        let Completion {
            task_id,
            target,
            source_id,
            result,
            cancel,
        } = completion;

        let current = self.binder.current_task(target) == Some(task_id);

        let event = match result {
            Some((image, origin)) => {
                let applied = !cancel.is_cancelled()
                    && current
                    && self.targets.apply(target, Arc::clone(&image));

                // Cache write-through strictly after target application;
                // a cache hit needs no re-insert
                if origin != DecodeOrigin::Cache {
                    self.cache.put(&source_id, image);
                }

                if applied {
                    LoadEvent::Applied {
                        target,
                        source_id,
                        origin,
                    }
                } else {
                    LoadEvent::Discarded { target, source_id }
                }
            }
            None if cancel.is_cancelled() => LoadEvent::Discarded { target, source_id },
            None => {
                tracing::debug!("no strategy produced a bitmap for {source_id}");
                LoadEvent::Failed { target, source_id }
            }
        };

        // The task is finished either way; free the binding it holds
        if current {
            self.binder.unbind_if(target, task_id);
        }
        event
    }
}
