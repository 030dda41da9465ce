//! Index statistics.
//!
//! Counters describing the incremental work an index has done.

use core::sync::atomic::{AtomicUsize, Ordering};

/// Statistics for an index.
#[derive(Debug)]
pub struct IndexStats {
    /// Number of entities held by the index's leaves.
    live_entities: AtomicUsize,
    /// ManyHash buckets created.
    buckets_created: AtomicUsize,
    /// ManyHash buckets removed because they became empty.
    buckets_pruned: AtomicUsize,
    /// Sort entries moved to a new position.
    sort_moves: AtomicUsize,
    /// Sort entries whose values changed without moving.
    in_place_updates: AtomicUsize,
}

impl IndexStats {
    /// Creates a new empty stats instance.
    pub fn new() -> Self {
        Self {
            live_entities: AtomicUsize::new(0),
            buckets_created: AtomicUsize::new(0),
            buckets_pruned: AtomicUsize::new(0),
            sort_moves: AtomicUsize::new(0),
            in_place_updates: AtomicUsize::new(0),
        }
    }

    /// Returns the number of entities held by the index.
    pub fn live_entities(&self) -> usize {
        self.live_entities.load(Ordering::Relaxed)
    }

    /// Returns the number of buckets created.
    pub fn buckets_created(&self) -> usize {
        self.buckets_created.load(Ordering::Relaxed)
    }

    /// Returns the number of buckets pruned.
    pub fn buckets_pruned(&self) -> usize {
        self.buckets_pruned.load(Ordering::Relaxed)
    }

    /// Returns the number of sort moves.
    pub fn sort_moves(&self) -> usize {
        self.sort_moves.load(Ordering::Relaxed)
    }

    /// Returns the number of in-place sort updates.
    pub fn in_place_updates(&self) -> usize {
        self.in_place_updates.load(Ordering::Relaxed)
    }

    pub(crate) fn entity_added(&self) {
        self.live_entities.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn entity_removed(&self) {
        self.live_entities.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn bucket_created(&self) {
        self.buckets_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn bucket_pruned(&self) {
        self.buckets_pruned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sort_moved(&self) {
        self.sort_moves.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sort_updated_in_place(&self) {
        self.in_place_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of live buckets.
    pub fn live_buckets(&self) -> usize {
        self.buckets_created() - self.buckets_pruned()
    }
}

impl Default for IndexStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for IndexStats {
    fn clone(&self) -> Self {
        Self {
            live_entities: AtomicUsize::new(self.live_entities()),
            buckets_created: AtomicUsize::new(self.buckets_created()),
            buckets_pruned: AtomicUsize::new(self.buckets_pruned()),
            sort_moves: AtomicUsize::new(self.sort_moves()),
            in_place_updates: AtomicUsize::new(self.in_place_updates()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = IndexStats::new();
        assert_eq!(stats.live_entities(), 0);
        assert_eq!(stats.live_buckets(), 0);
        assert_eq!(stats.sort_moves(), 0);
    }

    #[test]
    fn test_stats_entities() {
        let stats = IndexStats::new();
        stats.entity_added();
        stats.entity_added();
        stats.entity_removed();
        assert_eq!(stats.live_entities(), 1);
    }

    #[test]
    fn test_stats_buckets() {
        let stats = IndexStats::new();
        stats.bucket_created();
        stats.bucket_created();
        stats.bucket_pruned();
        assert_eq!(stats.buckets_created(), 2);
        assert_eq!(stats.buckets_pruned(), 1);
        assert_eq!(stats.live_buckets(), 1);
    }

    #[test]
    fn test_stats_clone() {
        let stats = IndexStats::new();
        stats.sort_moved();
        stats.sort_updated_in_place();
        stats.sort_updated_in_place();
        let cloned = stats.clone();
        assert_eq!(cloned.sort_moves(), 1);
        assert_eq!(cloned.in_place_updates(), 2);
    }
}
