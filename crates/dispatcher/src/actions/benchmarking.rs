//! Counting system actions for throughput measurement
//!
//! Stores are counted instead of performed; publishes are no-ops. Every
//! `report_every` calls of one operation a throughput line is logged.

use std::sync::Mutex;
use std::time::Instant;

use contracts::{AggregateSummary, BootState, SystemActions};
use tracing::info;

const DEFAULT_REPORT_EVERY: u64 = 10_000;

/// Count and elapsed time of one operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationCount {
    pub name: &'static str,
    pub count: u64,
    pub elapsed_ms: u128,
}

#[derive(Debug)]
struct Tally {
    name: &'static str,
    state: Mutex<TallyState>,
}

#[derive(Debug, Default)]
struct TallyState {
    count: u64,
    first: Option<Instant>,
    last: Option<Instant>,
}

impl Tally {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(TallyState::default()),
        }
    }

    fn tick(&self, report_every: u64) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let first = *state.first.get_or_insert(now);
        state.last = Some(now);
        if state.count % report_every == 0 {
            info!(
                operation = self.name,
                count = state.count,
                elapsed_ms = now.duration_since(first).as_millis() as u64,
                "benchmark progress"
            );
        }
        state.count += 1;
    }

    fn snapshot(&self) -> OperationCount {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        OperationCount {
            name: self.name,
            count: state.count,
            elapsed_ms: match (state.first, state.last) {
                (Some(first), Some(last)) => last.duration_since(first).as_millis(),
                _ => 0,
            },
        }
    }
}

/// Replaces real persistence with per-operation counters
#[derive(Debug)]
pub struct BenchmarkingSystemActions {
    report_every: u64,
    store_raw: Tally,
    store_aggregated: Tally,
    store_ras: Tally,
    store_state: Tally,
    store_inventory: Tally,
}

impl BenchmarkingSystemActions {
    pub fn new() -> Self {
        Self::with_report_interval(DEFAULT_REPORT_EVERY)
    }

    pub fn with_report_interval(report_every: u64) -> Self {
        Self {
            report_every: report_every.max(1),
            store_raw: Tally::new("storeRaw"),
            store_aggregated: Tally::new("storeAggregated"),
            store_ras: Tally::new("storeRas"),
            store_state: Tally::new("storeState"),
            store_inventory: Tally::new("storeInventory"),
        }
    }

    pub fn counts(&self) -> Vec<OperationCount> {
        [
            &self.store_raw,
            &self.store_aggregated,
            &self.store_ras,
            &self.store_state,
            &self.store_inventory,
        ]
        .into_iter()
        .map(Tally::snapshot)
        .collect()
    }
}

impl Default for BenchmarkingSystemActions {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemActions for BenchmarkingSystemActions {
    fn store_normalized_data(&self, _: &str, _: &str, _: i64, _: f64) {
        self.store_raw.tick(self.report_every);
    }

    fn store_aggregated_data(&self, _: &str, _: &str, _: i64, _: &AggregateSummary) {
        self.store_aggregated.tick(self.report_every);
    }

    fn store_ras_event(&self, _: &str, _: &str, _: &str, _: i64) {
        self.store_ras.tick(self.report_every);
    }

    fn publish_normalized_data(&self, _: &str, _: &str, _: &str, _: i64, _: f64) {}

    fn publish_aggregated_data(&self, _: &str, _: &str, _: &str, _: i64, _: &AggregateSummary) {}

    fn publish_ras_event(&self, _: &str, _: &str, _: &str, _: &str, _: i64) {}

    fn publish_boot_event(&self, _: &str, _: BootState, _: &str, _: i64) {}

    fn change_node_state(&self, _: BootState, _: &str, _: i64, _: bool) {
        self.store_state.tick(self.report_every);
    }

    fn upsert_inventory(&self, _: &str, _: &str, _: i64) {
        self.store_inventory.tick(self.report_every);
    }

    fn delete_inventory(&self, _: &str, _: i64) {
        self.store_inventory.tick(self.report_every);
    }

    fn close(&self) {
        for count in self.counts() {
            info!(
                operation = count.name,
                count = count.count,
                elapsed_ms = count.elapsed_ms as u64,
                "benchmark totals"
            );
        }
    }
}
