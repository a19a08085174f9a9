//! Association between image targets and their in-flight tasks.
//!
//! The binder is a back-reference, never an ownership edge: it records
//! which task currently serves a target so a newer request can detect a
//! duplicate or supersede a stale one. Entries for destroyed targets are
//! dead on lookup because the handle's generation no longer matches.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::target::{TargetHandle, TargetRegistry};
use super::task::CancelToken;

/// What `check_existing` found bound to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingTask {
    /// Nothing in flight; start fresh
    Fresh,
    /// The same source is already in flight; the caller must no-op
    Duplicate,
    /// A different source was in flight and has been cancelled
    Superseded,
}

pub(super) struct BoundTask {
    pub task_id: u64,
    pub source_id: String,
    pub cancel: CancelToken,
}

/// Tracks the current task per target.
pub struct TaskBinder {
    targets: Arc<TargetRegistry>,
    bound: Mutex<HashMap<TargetHandle, BoundTask>>,
}

impl TaskBinder {
    /// Create a binder over the given target registry.
    #[must_use]
    pub fn new(targets: Arc<TargetRegistry>) -> Self {
        Self {
            targets,
            bound: Mutex::new(HashMap::new()),
        }
    }

    /// Record `task` as the current owner of `target`, replacing any
    /// prior record.
    pub(super) fn bind(&self, target: TargetHandle, task: BoundTask) {
        self.bound.lock().unwrap().insert(target, task);
    }

    /// Task id currently bound to `target`, or `None` if nothing is bound
    /// or the target has been destroyed.
    pub fn current_task(&self, target: TargetHandle) -> Option<u64> {
        if !self.targets.is_live(target) {
            return None;
        }
        self.bound
            .lock()
            .unwrap()
            .get(&target)
            .map(|task| task.task_id)
    }

    /// Decide what to do about a task already bound to `target`.
    ///
    /// A duplicate (same source id in flight) means the caller must not
    /// start a new task. A different source id supersedes: the existing
    /// task's cancel flag is raised here.
    pub fn check_existing(&self, new_source_id: &str, target: TargetHandle) -> ExistingTask {
        if !self.targets.is_live(target) {
            return ExistingTask::Fresh;
        }
        let bound = self.bound.lock().unwrap();
        let Some(existing) = bound.get(&target) else {
            return ExistingTask::Fresh;
        };
        if existing.source_id == new_source_id {
            return ExistingTask::Duplicate;
        }
        existing.cancel.cancel();
        ExistingTask::Superseded
    }

    /// Remove the binding for `target` if it still names `task_id`.
    /// Called when that task completes.
    pub(super) fn unbind_if(&self, target: TargetHandle, task_id: u64) {
        let mut bound = self.bound.lock().unwrap();
        if bound.get(&target).is_some_and(|t| t.task_id == task_id) {
            bound.remove(&target);
        }
    }

    /// Cancel and drop whatever is bound to `target`. Called when the
    /// target is destroyed.
    pub(super) fn release(&self, target: TargetHandle) {
        if let Some(task) = self.bound.lock().unwrap().remove(&target) {
            task.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: u64, source: &str) -> (BoundTask, CancelToken) {
        let cancel = CancelToken::new();
        (
            BoundTask {
                task_id: id,
                source_id: source.to_string(),
                cancel: cancel.clone(),
            },
            cancel,
        )
    }

    #[test]
    fn test_fresh_when_unbound() {
        let targets = Arc::new(TargetRegistry::new());
        let binder = TaskBinder::new(Arc::clone(&targets));
        let t = targets.create();
        assert_eq!(binder.check_existing("img-1", t), ExistingTask::Fresh);
        assert!(binder.current_task(t).is_none());
    }

    #[test]
    fn test_duplicate_in_flight() {
        let targets = Arc::new(TargetRegistry::new());
        let binder = TaskBinder::new(Arc::clone(&targets));
        let t = targets.create();

        let (bound, cancel) = task(1, "img-1");
        binder.bind(t, bound);
        assert_eq!(binder.check_existing("img-1", t), ExistingTask::Duplicate);
        assert!(!cancel.is_cancelled());
        assert_eq!(binder.current_task(t), Some(1));
    }

    #[test]
    fn test_supersede_cancels_existing() {
        let targets = Arc::new(TargetRegistry::new());
        let binder = TaskBinder::new(Arc::clone(&targets));
        let t = targets.create();

        let (bound, cancel) = task(1, "img-1");
        binder.bind(t, bound);
        assert_eq!(binder.check_existing("img-2", t), ExistingTask::Superseded);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_rebind_replaces() {
        let targets = Arc::new(TargetRegistry::new());
        let binder = TaskBinder::new(Arc::clone(&targets));
        let t = targets.create();

        binder.bind(t, task(1, "img-1").0);
        binder.bind(t, task(2, "img-2").0);
        assert_eq!(binder.current_task(t), Some(2));
    }

    #[test]
    fn test_dead_target_yields_nothing() {
        let targets = Arc::new(TargetRegistry::new());
        let binder = TaskBinder::new(Arc::clone(&targets));
        let t = targets.create();

        binder.bind(t, task(1, "img-1").0);
        targets.destroy(t);
        assert!(binder.current_task(t).is_none());
        assert_eq!(binder.check_existing("img-2", t), ExistingTask::Fresh);
    }

    #[test]
    fn test_unbind_only_when_current() {
        let targets = Arc::new(TargetRegistry::new());
        let binder = TaskBinder::new(Arc::clone(&targets));
        let t = targets.create();

        binder.bind(t, task(2, "img-2").0);
        // A stale task finishing must not clear the newer binding
        binder.unbind_if(t, 1);
        assert_eq!(binder.current_task(t), Some(2));
        binder.unbind_if(t, 2);
        assert!(binder.current_task(t).is_none());
    }
}
