//! Byte-budgeted LRU memory tier.

use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;

/// Estimated resident cost of a decoded bitmap, in bytes.
///
/// Four bytes per pixel regardless of the source color type; accounting
/// only needs to be consistent, not exact.
#[must_use]
pub fn bitmap_cost(image: &DynamicImage) -> usize {
    image.width() as usize * image.height() as usize * 4
}

struct Entry {
    image: Arc<DynamicImage>,
    bytes: usize,
    /// Recency stamp from a monotonic counter. Unique per access, so
    /// eviction order has no ties and falls back to insertion order.
    stamp: u64,
}

/// In-memory LRU tier. Not synchronized; `BitmapCache` wraps it in a mutex
/// together with the byte accounting.
pub(super) struct MemoryTier {
    entries: HashMap<String, Entry>,
    total_bytes: usize,
    budget_bytes: usize,
    clock: u64,
}

impl MemoryTier {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            entries: HashMap::new(),
            total_bytes: 0,
            budget_bytes,
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up `key`, marking the entry most-recently-used on a hit.
    pub fn get(&mut self, key: &str) -> Option<Arc<DynamicImage>> {
        let stamp = self.tick();
        let entry = self.entries.get_mut(key)?;
        entry.stamp = stamp;
        Some(Arc::clone(&entry.image))
    }

    /// Insert `image` under `key`, then evict least-recently-used entries
    /// until the aggregate size is back under budget.
    pub fn insert(&mut self, key: &str, image: Arc<DynamicImage>) {
        let bytes = bitmap_cost(&image);
        let stamp = self.tick();

        if let Some(old) = self.entries.insert(
            key.to_string(),
            Entry {
                image,
                bytes,
                stamp,
            },
        ) {
            self.total_bytes -= old.bytes;
        }
        self.total_bytes += bytes;

        self.evict_over_budget();
    }

    fn evict_over_budget(&mut self) {
        while self.total_bytes > self.budget_bytes {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stamp)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                self.total_bytes -= entry.bytes;
                tracing::debug!("evicted {oldest} ({} bytes)", entry.bytes);
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap(width: u32, height: u32) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgba8(width, height))
    }

    #[test]
    fn test_put_then_get() {
        let mut tier = MemoryTier::new(1024 * 1024);
        let img = bitmap(10, 10);
        tier.insert("k", Arc::clone(&img));
        let got = tier.get("k").unwrap();
        assert!(Arc::ptr_eq(&img, &got));
    }

    #[test]
    fn test_budget_never_exceeded() {
        // Budget fits two 10x10 bitmaps (400 bytes each), not three
        let mut tier = MemoryTier::new(900);
        tier.insert("a", bitmap(10, 10));
        tier.insert("b", bitmap(10, 10));
        tier.insert("c", bitmap(10, 10));
        assert!(tier.total_bytes() <= 900);
        assert_eq!(tier.len(), 2);
        // "a" was least recently used
        assert!(!tier.contains("a"));
        assert!(tier.contains("b"));
        assert!(tier.contains("c"));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut tier = MemoryTier::new(900);
        tier.insert("a", bitmap(10, 10));
        tier.insert("b", bitmap(10, 10));
        // Touch "a" so "b" becomes the eviction candidate
        tier.get("a").unwrap();
        tier.insert("c", bitmap(10, 10));
        assert!(tier.contains("a"));
        assert!(!tier.contains("b"));
    }

    #[test]
    fn test_oversized_entry_not_retained() {
        let mut tier = MemoryTier::new(100);
        tier.insert("huge", bitmap(100, 100));
        assert!(!tier.contains("huge"));
        assert_eq!(tier.total_bytes(), 0);
    }

    #[test]
    fn test_reinsert_same_key_adjusts_accounting() {
        let mut tier = MemoryTier::new(10_000);
        tier.insert("k", bitmap(10, 10));
        tier.insert("k", bitmap(20, 20));
        assert_eq!(tier.total_bytes(), 20 * 20 * 4);
        assert_eq!(tier.len(), 1);
    }
}
