//! Shared synchronization state between Extractors, Loaders, and the Observer (section 5).
//!
//! Replaces the source's thread-sync shared booleans with typed atomic counters and a single
//! atomic throttle flag, per the redesign note in section 9.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Per-side completion bookkeeping shared by every Extractor/Loader working one table.
pub struct SideSync {
    running_extractors: AtomicU32,
    loader_complete: AtomicU32,
    complete: AtomicBool,
    staged_rows: AtomicU64,
}

impl SideSync {
    pub fn new(extractor_count: u32) -> Self {
        Self {
            running_extractors: AtomicU32::new(extractor_count),
            loader_complete: AtomicU32::new(0),
            complete: AtomicBool::new(false),
            staged_rows: AtomicU64::new(0),
        }
    }

    /// Called by an Extractor when its shard reaches end-of-cursor. Raises `complete` once
    /// the last extractor finishes.
    pub fn extractor_done(&self) {
        if self.running_extractors.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.complete.store(true, Ordering::Release);
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn loader_finished(&self) {
        self.loader_complete.fetch_add(1, Ordering::AcqRel);
    }

    pub fn loaders_finished(&self) -> u32 {
        self.loader_complete.load(Ordering::Acquire)
    }

    pub fn add_staged_rows(&self, n: u64) {
        self.staged_rows.fetch_add(n, Ordering::AcqRel);
    }

    pub fn staged_rows(&self) -> u64 {
        self.staged_rows.load(Ordering::Acquire)
    }
}

/// The Observer's single atomic throttle flag: when set, Extractors block before their next
/// enqueue until it clears.
#[derive(Default)]
pub struct ThrottleFlag {
    flag: AtomicBool,
}

impl ThrottleFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Everything an Extractor/Loader/Observer pair needs to coordinate one table's reconciliation.
/// Each side's counters are `Arc`-wrapped so every Extractor/Loader/Observer task spawned for
/// that side can hold its own cheap handle onto the same atomics.
pub struct TableSync {
    pub source: Arc<SideSync>,
    pub target: Arc<SideSync>,
    pub throttle: Arc<ThrottleFlag>,
}

impl TableSync {
    pub fn new(source_extractors: u32, target_extractors: u32) -> Self {
        Self {
            source: Arc::new(SideSync::new(source_extractors)),
            target: Arc::new(SideSync::new(target_extractors)),
            throttle: Arc::new(ThrottleFlag::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extractor_done_raises_complete_only_at_zero() {
        let side = SideSync::new(2);
        assert!(!side.is_complete());
        side.extractor_done();
        assert!(!side.is_complete());
        side.extractor_done();
        assert!(side.is_complete());
    }

    #[test]
    fn test_throttle_flag_toggles() {
        let flag = ThrottleFlag::new();
        assert!(!flag.is_set());
        flag.set();
        assert!(flag.is_set());
        flag.clear();
        assert!(!flag.is_set());
    }

    #[test]
    fn test_staged_rows_accumulate() {
        let side = SideSync::new(1);
        side.add_staged_rows(100);
        side.add_staged_rows(50);
        assert_eq!(side.staged_rows(), 150);
    }
}
