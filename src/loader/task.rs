//! Background decode tasks and the worker pool.
//!
//! Each load request becomes one job: Pending until a worker picks it up,
//! Running while the fallback chain executes on the blocking pool, then
//! Completed or Cancelled. Cancellation is cooperative; a flag is checked
//! before work starts and re-checked at completion time by the poller.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::DynamicImage;
use tokio::sync::mpsc;

use crate::cache::BitmapCache;
use crate::decode::{self, BoundsPreset, DecodeOrigin};

use super::target::TargetHandle;

/// Cooperative cancellation flag shared between a task and its binder.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. In-flight work is not interrupted; its result is
    /// discarded at completion time.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One unit of decode work handed to the pool.
pub(super) struct Job {
    pub task_id: u64,
    pub target: TargetHandle,
    pub path: PathBuf,
    pub source_id: String,
    pub preset: BoundsPreset,
    pub cancel: CancelToken,
}

/// Outcome of a job, reported back to the poller.
pub(super) struct Completion {
    pub task_id: u64,
    pub target: TargetHandle,
    pub source_id: String,
    pub result: Option<(Arc<DynamicImage>, DecodeOrigin)>,
    pub cancel: CancelToken,
}

/// Spawn the fixed-size worker pool.
///
/// Workers pull jobs from a shared queue and report completions on the
/// returned receiver. Dropping the job sender shuts the pool down.
pub(super) fn spawn_pool(
    workers: usize,
    cache: BitmapCache,
) -> (
    mpsc::UnboundedSender<Job>,
    mpsc::UnboundedReceiver<Completion>,
) {
    let (job_tx, job_rx) = mpsc::unbounded_channel();
    let (done_tx, done_rx) = mpsc::unbounded_channel();

    let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));
    for worker in 0..workers.max(1) {
        let jobs = Arc::clone(&job_rx);
        let done = done_tx.clone();
        let cache = cache.clone();
        tokio::spawn(async move {
            loop {
                // Hold the queue lock only while receiving
                let job = jobs.lock().await.recv().await;
                let Some(job) = job else { break };
                let completion = run_job(job, &cache).await;
                if done.send(completion).is_err() {
                    break;
                }
            }
            tracing::debug!("decode worker {worker} shutting down");
        });
    }

    (job_tx, done_rx)
}

async fn run_job(job: Job, cache: &BitmapCache) -> Completion {
    // Cancelled before a worker ever picked it up: skip the decode
    if job.cancel.is_cancelled() {
        return Completion {
            task_id: job.task_id,
            target: job.target,
            source_id: job.source_id,
            result: None,
            cancel: job.cancel,
        };
    }

    let cache = cache.clone();
    let path = job.path.clone();
    let key = job.source_id.clone();
    let preset = job.preset;
    let result = tokio::task::spawn_blocking(move || load_with_fallback(&path, &key, preset, &cache))
        .await
        .ok()
        .flatten();

    Completion {
        task_id: job.task_id,
        target: job.target,
        source_id: job.source_id,
        result,
        cancel: job.cancel,
    }
}

/// Run the fallback chain for one source: embedded preview, cache,
/// bounded decode, then a direct decode as last resort.
pub(super) fn load_with_fallback(
    path: &std::path::Path,
    key: &str,
    preset: BoundsPreset,
    cache: &BitmapCache,
) -> Option<(Arc<DynamicImage>, DecodeOrigin)> {
    let (target_w, target_h) = preset.bounds();

    if preset.accepts_embedded() {
        if let Some(image) = decode::embedded_thumbnail(path, target_w, target_h) {
            return Some((Arc::new(image), DecodeOrigin::Embedded));
        }
    }

    if let Some(image) = cache.get(key) {
        return Some((image, DecodeOrigin::Cache));
    }

    if let Some(image) = decode::decode_bounded(path, target_w, target_h) {
        return Some((Arc::new(image), DecodeOrigin::Sampled));
    }

    decode::decode_direct(path).map(|image| (Arc::new(image), DecodeOrigin::Direct))
}
