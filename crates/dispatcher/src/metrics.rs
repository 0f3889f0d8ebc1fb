//! Dispatcher counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters shared by the sink callback and the workers
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Messages currently queued
    queue_len: AtomicUsize,
    /// Messages accepted by the sink callback
    received_count: AtomicU64,
    /// Messages transformed and acted on
    processed_count: AtomicU64,
    /// Records handed to `Provider::act`
    records_count: AtomicU64,
    /// Messages dropped by the subject filter
    filtered_count: AtomicU64,
    /// Messages dropped after a transform error
    failure_count: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn received_count(&self) -> u64 {
        self.received_count.load(Ordering::Relaxed)
    }

    pub fn inc_received_count(&self) {
        self.received_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }

    pub fn inc_processed_count(&self) {
        self.processed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_count(&self) -> u64 {
        self.records_count.load(Ordering::Relaxed)
    }

    pub fn add_records(&self, count: usize) {
        self.records_count.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn filtered_count(&self) -> u64 {
        self.filtered_count.load(Ordering::Relaxed)
    }

    pub fn inc_filtered_count(&self) {
        self.filtered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            queue_len: self.queue_len(),
            received_count: self.received_count(),
            processed_count: self.processed_count(),
            records_count: self.records_count(),
            filtered_count: self.filtered_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Snapshot of dispatcher metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchMetricsSnapshot {
    pub queue_len: usize,
    pub received_count: u64,
    pub processed_count: u64,
    pub records_count: u64,
    pub filtered_count: u64,
    pub failure_count: u64,
}
