//! Built-in `SystemActions`

mod benchmarking;
mod log;

use std::sync::Arc;

use contracts::SystemActions;

pub use benchmarking::{BenchmarkingSystemActions, OperationCount};
pub use log::{
    format_aggregate_message, format_boot_message, format_event_message, format_raw_message,
    LogSystemActions,
};

/// `BenchmarkingSystemActions` when `use_benchmarking`, otherwise `LogSystemActions`
pub fn create_system_actions(use_benchmarking: bool) -> Arc<dyn SystemActions> {
    if use_benchmarking {
        Arc::new(BenchmarkingSystemActions::new())
    } else {
        Arc::new(LogSystemActions::new())
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingActions;
