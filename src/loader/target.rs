//! Generation-indexed handles for UI image targets.
//!
//! A target stands in for an image view. Handles carry a slot index plus a
//! generation; destroying a target bumps the slot's generation, so every
//! outstanding handle for it goes dead without any weak-reference
//! machinery.

use std::sync::{Arc, Mutex};

use image::DynamicImage;

/// Opaque handle to a registered image target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    slot: usize,
    generation: u64,
}

struct Slot {
    generation: u64,
    live: bool,
    applied: Option<Arc<DynamicImage>>,
}

/// Registry of live image targets.
///
/// Thread-safe; shared between the loader facade and the task binder.
#[derive(Default)]
pub struct TargetRegistry {
    slots: Mutex<Vec<Slot>>,
}

impl TargetRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new target and return its handle.
    pub fn create(&self) -> TargetHandle {
        let mut slots = self.slots.lock().unwrap();

        // Reuse a dead slot if there is one
        if let Some(slot) = slots.iter().position(|s| !s.live) {
            let entry = &mut slots[slot];
            entry.generation += 1;
            entry.live = true;
            entry.applied = None;
            return TargetHandle {
                slot,
                generation: entry.generation,
            };
        }

        slots.push(Slot {
            generation: 0,
            live: true,
            applied: None,
        });
        TargetHandle {
            slot: slots.len() - 1,
            generation: 0,
        }
    }

    /// Destroy a target. Outstanding handles go dead immediately.
    pub fn destroy(&self, handle: TargetHandle) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(entry) = slots.get_mut(handle.slot) {
            if entry.generation == handle.generation {
                entry.live = false;
                entry.applied = None;
            }
        }
    }

    /// Whether `handle` still refers to a live target.
    pub fn is_live(&self, handle: TargetHandle) -> bool {
        let slots = self.slots.lock().unwrap();
        slots
            .get(handle.slot)
            .is_some_and(|entry| entry.live && entry.generation == handle.generation)
    }

    /// Apply a bitmap to a live target. Returns `false` (and drops the
    /// bitmap) if the handle is dead.
    pub fn apply(&self, handle: TargetHandle, image: Arc<DynamicImage>) -> bool {
        let mut slots = self.slots.lock().unwrap();
        match slots.get_mut(handle.slot) {
            Some(entry) if entry.live && entry.generation == handle.generation => {
                entry.applied = Some(image);
                true
            }
            _ => false,
        }
    }

    /// The bitmap currently applied to `handle`, if any.
    pub fn applied(&self, handle: TargetHandle) -> Option<Arc<DynamicImage>> {
        let slots = self.slots.lock().unwrap();
        let entry = slots.get(handle.slot)?;
        if entry.live && entry.generation == handle.generation {
            entry.applied.clone()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap() -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgba8(4, 4))
    }

    #[test]
    fn test_create_and_apply() {
        let registry = TargetRegistry::new();
        let t = registry.create();
        assert!(registry.is_live(t));
        assert!(registry.applied(t).is_none());

        assert!(registry.apply(t, bitmap()));
        assert!(registry.applied(t).is_some());
    }

    #[test]
    fn test_destroy_kills_handle() {
        let registry = TargetRegistry::new();
        let t = registry.create();
        registry.destroy(t);
        assert!(!registry.is_live(t));
        assert!(!registry.apply(t, bitmap()));
        assert!(registry.applied(t).is_none());
    }

    #[test]
    fn test_slot_reuse_does_not_revive_old_handle() {
        let registry = TargetRegistry::new();
        let old = registry.create();
        registry.destroy(old);

        // New target lands in the recycled slot with a newer generation
        let new = registry.create();
        assert_ne!(old, new);
        assert!(registry.is_live(new));
        assert!(!registry.is_live(old));
        assert!(!registry.apply(old, bitmap()));
    }
}
