//! Dispatcher tuning

use std::time::Duration;

/// Hard upper bound of the worker pool
pub const MAX_WORKERS: usize = 3;

/// Empty-queue sleep law: start at `initial`, add `step` per empty poll while
/// below `max`. Values are multiples of `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: u64,
    pub step: u64,
    pub max: u64,
    pub unit: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: 1,
            step: 2,
            max: 25,
            unit: Duration::from_millis(1),
        }
    }
}

/// Runtime settings of an [`IngestionDispatcher`](crate::IngestionDispatcher)
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Wait after starting every sink before checking which ones connected
    pub stabilization_interval: Duration,

    /// Period of the background restart loop for sinks that are not connected
    pub reconnect_interval: Duration,

    /// Upper bound for the worker count, itself capped at [`MAX_WORKERS`]
    pub max_workers: usize,

    /// Fixed worker count, bypassing the parallelism heuristic but not the cap
    pub worker_count: Option<usize>,

    pub backoff: BackoffConfig,

    /// Characters of a failing payload included in the log line
    pub preview_len: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            stabilization_interval: Duration::from_millis(1500),
            reconnect_interval: Duration::from_millis(1500),
            max_workers: MAX_WORKERS,
            worker_count: None,
            backoff: BackoffConfig::default(),
            preview_len: 256,
        }
    }
}

impl DispatcherConfig {
    /// `min(available_parallelism / 2, max_workers)`, always within `1..=MAX_WORKERS`
    pub fn effective_worker_count(&self) -> usize {
        let cap = self.max_workers.clamp(1, MAX_WORKERS);
        if let Some(count) = self.worker_count {
            return count.clamp(1, cap);
        }
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        worker_count_for(available, cap)
    }
}

pub(crate) fn worker_count_for(available: usize, max_workers: usize) -> usize {
    (available / 2).min(max_workers.min(MAX_WORKERS)).max(1)
}
