use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use parking_lot::Mutex;

#[derive(Debug, Default, Clone, Copy)]
struct SyncTiming {
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

/// Counters describing the progress of a trie sync.
/// Shared between the syncer and whoever reports on it, every method takes `&self`.
#[derive(Debug, Default)]
pub struct TrieSyncStatistics {
    num_requested: AtomicU64,
    num_distinct_requested: AtomicU64,
    num_request_batches: AtomicU64,
    num_received: AtomicU64,
    num_bytes_received: AtomicU64,
    num_large: AtomicU64,
    num_missing: AtomicU64,
    max_num_missing: AtomicU64,
    timing: Mutex<SyncTiming>,
}

/// Point-in-time copy of [`TrieSyncStatistics`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrieSyncStatisticsSnapshot {
    /// Node hashes sent out in requests, re-requests included
    pub num_requested: u64,
    /// Node hashes requested at least once
    pub num_distinct_requested: u64,
    pub num_request_batches: u64,
    /// Nodes accepted from the network
    pub num_received: u64,
    pub num_bytes_received: u64,
    /// Received nodes above the large node threshold
    pub num_large: u64,
    /// Nodes currently tracked but not yet received
    pub num_missing: u64,
    /// Highest value `num_missing` reached
    pub max_num_missing: u64,
    pub elapsed: Option<Duration>,
}

impl TrieSyncStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request for `num_hashes` hashes, `num_new_hashes` of them asked for the first time
    pub fn add_requested_batch(&self, num_hashes: u64, num_new_hashes: u64) {
        self.num_requested.fetch_add(num_hashes, Ordering::Relaxed);
        self.num_distinct_requested.fetch_add(num_new_hashes, Ordering::Relaxed);
        self.num_request_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_received(&self, size_in_bytes: u64) {
        self.num_received.fetch_add(1, Ordering::Relaxed);
        self.num_bytes_received.fetch_add(size_in_bytes, Ordering::Relaxed);
    }

    pub fn add_large(&self) {
        self.num_large.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_num_missing(&self, num_missing: u64) {
        self.num_missing.store(num_missing, Ordering::Relaxed);
        self.max_num_missing.fetch_max(num_missing, Ordering::Relaxed);
    }

    pub fn num_requested(&self) -> u64 {
        self.num_requested.load(Ordering::Relaxed)
    }

    pub fn num_distinct_requested(&self) -> u64 {
        self.num_distinct_requested.load(Ordering::Relaxed)
    }

    pub fn num_received(&self) -> u64 {
        self.num_received.load(Ordering::Relaxed)
    }

    pub fn num_large(&self) -> u64 {
        self.num_large.load(Ordering::Relaxed)
    }

    pub fn num_missing(&self) -> u64 {
        self.num_missing.load(Ordering::Relaxed)
    }

    pub fn max_num_missing(&self) -> u64 {
        self.max_num_missing.load(Ordering::Relaxed)
    }

    /// Marks the beginning of a sync, clearing any previous finish time
    pub fn start(&self) {
        *self.timing.lock() = SyncTiming {
            started_at: Some(Instant::now()),
            finished_at: None,
        };
    }

    pub fn finish(&self) {
        self.timing.lock().finished_at = Some(Instant::now());
    }

    /// Time spent syncing so far, or in total once finished
    pub fn elapsed(&self) -> Option<Duration> {
        let timing = *self.timing.lock();
        let started_at = timing.started_at?;
        Some(
            timing
                .finished_at
                .unwrap_or_else(Instant::now)
                .duration_since(started_at),
        )
    }

    pub fn snapshot(&self) -> TrieSyncStatisticsSnapshot {
        TrieSyncStatisticsSnapshot {
            num_requested: self.num_requested.load(Ordering::Relaxed),
            num_distinct_requested: self.num_distinct_requested.load(Ordering::Relaxed),
            num_request_batches: self.num_request_batches.load(Ordering::Relaxed),
            num_received: self.num_received.load(Ordering::Relaxed),
            num_bytes_received: self.num_bytes_received.load(Ordering::Relaxed),
            num_large: self.num_large.load(Ordering::Relaxed),
            num_missing: self.num_missing.load(Ordering::Relaxed),
            max_num_missing: self.max_num_missing.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.num_requested,
            &self.num_distinct_requested,
            &self.num_request_batches,
            &self.num_received,
            &self.num_bytes_received,
            &self.num_large,
            &self.num_missing,
            &self.max_num_missing,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self.timing.lock() = SyncTiming::default();
    }
}
