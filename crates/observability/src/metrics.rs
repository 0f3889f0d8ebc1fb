//! Dispatch metrics
//!
//! Prometheus-facing recorders called from the sinks and the dispatcher, plus
//! an in-memory aggregator for the end-of-run summary.

use std::collections::BTreeMap;

use metrics::{counter, gauge, histogram};

/// Message accepted by a sink and queued for processing
pub fn record_message_received(subject: &str) {
    counter!(
        "monitor_adapter_messages_received_total",
        "subject" => subject.to_string()
    )
    .increment(1);
}

/// Message discarded before reaching a provider (`reason`: `subject`, `transform`, `queue_closed`)
pub fn record_message_dropped(reason: &'static str) {
    counter!("monitor_adapter_messages_dropped_total", "reason" => reason).increment(1);
}

pub fn record_transform_failure(subject: &str) {
    counter!(
        "monitor_adapter_transform_failures_total",
        "subject" => subject.to_string()
    )
    .increment(1);
}

/// Records handed to `Provider::act` for one message
pub fn record_records_acted(subject: &str, profile: &str, count: usize) {
    counter!(
        "monitor_adapter_records_acted_total",
        "subject" => subject.to_string(),
        "profile" => profile.to_string()
    )
    .increment(count as u64);
}

/// Transform plus act duration of one message
pub fn record_processing_latency_ms(subject: &str, latency_ms: f64) {
    histogram!(
        "monitor_adapter_processing_latency_ms",
        "subject" => subject.to_string()
    )
    .record(latency_ms);
}

pub fn record_queue_depth(depth: usize) {
    gauge!("monitor_adapter_queue_depth").set(depth as f64);
}

/// 1 while the stream reports an open connection
pub fn record_stream_connected(stream: &str, connected: bool) {
    gauge!("monitor_adapter_stream_connected", "stream" => stream.to_string())
        .set(if connected { 1.0 } else { 0.0 });
}

/// In-memory processing statistics
#[derive(Debug, Clone, Default)]
pub struct ProcessingStatsAggregator {
    pub messages_processed: u64,
    pub records_acted: u64,
    pub transform_failures: u64,
    pub filtered: u64,
    pub latency_stats: RunningStats,
    pub records_per_message: RunningStats,
    pub subject_counts: BTreeMap<String, u64>,
}

impl ProcessingStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// One message transformed and acted on
    pub fn update(&mut self, subject: &str, records: usize, latency_ms: f64) {
        self.messages_processed += 1;
        self.records_acted += records as u64;
        self.latency_stats.push(latency_ms);
        self.records_per_message.push(records as f64);
        *self.subject_counts.entry(subject.to_string()).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self) {
        self.transform_failures += 1;
    }

    pub fn record_filtered(&mut self) {
        self.filtered += 1;
    }

    pub fn summary(&self) -> ProcessingSummary {
        let attempted = self.messages_processed + self.transform_failures;
        ProcessingSummary {
            messages_processed: self.messages_processed,
            records_acted: self.records_acted,
            transform_failures: self.transform_failures,
            filtered: self.filtered,
            failure_rate: if attempted > 0 {
                self.transform_failures as f64 / attempted as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
            records_per_message: StatsSummary::from(&self.records_per_message),
            subject_counts: self.subject_counts.clone(),
        }
    }

    /// Fold another aggregator (e.g. one worker's) into this one
    pub fn merge(&mut self, other: &ProcessingStatsAggregator) {
        self.messages_processed += other.messages_processed;
        self.records_acted += other.records_acted;
        self.transform_failures += other.transform_failures;
        self.filtered += other.filtered;
        self.latency_stats.merge(&other.latency_stats);
        self.records_per_message.merge(&other.records_per_message);
        for (subject, count) in &other.subject_counts {
            *self.subject_counts.entry(subject.clone()).or_insert(0) += count;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Snapshot produced by [`ProcessingStatsAggregator::summary`]
#[derive(Debug, Clone, Default)]
pub struct ProcessingSummary {
    pub messages_processed: u64,
    pub records_acted: u64,
    pub transform_failures: u64,
    pub filtered: u64,
    pub failure_rate: f64,
    pub latency_ms: StatsSummary,
    pub records_per_message: StatsSummary,
    pub subject_counts: BTreeMap<String, u64>,
}

impl std::fmt::Display for ProcessingSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(f, "Messages processed: {}", self.messages_processed)?;
        writeln!(f, "Records acted: {}", self.records_acted)?;
        writeln!(
            f,
            "Transform failures: {} ({:.2}%)",
            self.transform_failures, self.failure_rate
        )?;
        writeln!(f, "Filtered by subject: {}", self.filtered)?;
        writeln!(f, "Processing latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Records per message: {}", self.records_per_message)?;

        if !self.subject_counts.is_empty() {
            writeln!(f, "Messages per subject:")?;
            for (subject, count) in &self.subject_counts {
                writeln!(f, "  {}: {}", subject, count)?;
            }
        }

        Ok(())
    }
}

/// Summary of a [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Combine two partial streams (Chan et al. parallel variance)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        let (n_a, n_b, n) = (self.count as f64, other.count as f64, count as f64);
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_running_stats_merge() {
        let mut left = RunningStats::default();
        let mut right = RunningStats::default();
        for value in [1.0, 2.0] {
            left.push(value);
        }
        for value in [3.0, 4.0, 5.0] {
            right.push(value);
        }

        left.merge(&right);
        left.merge(&RunningStats::default());

        assert_eq!(left.count(), 5);
        assert!((left.mean() - 3.0).abs() < 1e-10);
        assert!((left.min() - 1.0).abs() < 1e-10);
        assert!((left.max() - 5.0).abs() < 1e-10);
        assert!((left.variance() - 2.5).abs() < 1e-10);

        let mut empty = RunningStats::default();
        empty.merge(&right);
        assert_eq!(empty.count(), 3);
        assert!((empty.mean() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_merge() {
        let mut total = ProcessingStatsAggregator::new();
        total.update("telemetry", 2, 1.0);

        let mut worker = ProcessingStatsAggregator::new();
        worker.update("telemetry", 1, 3.0);
        worker.update("events", 4, 2.0);
        worker.record_failure();
        worker.record_filtered();

        total.merge(&worker);

        assert_eq!(total.messages_processed, 3);
        assert_eq!(total.records_acted, 7);
        assert_eq!(total.transform_failures, 1);
        assert_eq!(total.filtered, 1);
        assert_eq!(total.subject_counts.get("telemetry"), Some(&2));
        assert_eq!(total.subject_counts.get("events"), Some(&1));
        assert!((total.latency_stats.mean() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = ProcessingStatsAggregator::new();

        aggregator.update("telemetry", 3, 1.5);
        aggregator.update("telemetry", 1, 0.5);
        aggregator.update("events", 0, 0.1);
        aggregator.record_failure();
        aggregator.record_filtered();

        assert_eq!(aggregator.messages_processed, 3);
        assert_eq!(aggregator.records_acted, 4);
        assert_eq!(aggregator.subject_counts.get("telemetry"), Some(&2));

        let summary = aggregator.summary();
        assert_eq!(summary.transform_failures, 1);
        assert!((summary.failure_rate - 25.0).abs() < 1e-10);
        assert_eq!(summary.latency_ms.count, 3);
    }

    #[test]
    fn test_summary_display() {
        let summary = ProcessingSummary {
            messages_processed: 100,
            records_acted: 250,
            transform_failures: 5,
            filtered: 7,
            failure_rate: 4.76,
            latency_ms: StatsSummary {
                count: 100,
                min: 0.2,
                max: 8.0,
                mean: 1.1,
                std_dev: 0.4,
            },
            records_per_message: StatsSummary::default(),
            subject_counts: BTreeMap::from([("telemetry".to_string(), 100)]),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Messages processed: 100"));
        assert!(output.contains("4.76%"));
        assert!(output.contains("Records per message: N/A"));
        assert!(output.contains("  telemetry: 100"));
    }
}
