//! # Dispatcher
//!
//! Runs one adapter profile end to end.
//!
//! Responsibilities:
//! - Create and start one sink per network stream of the profile
//! - Queue every `(subject, payload)` the sinks deliver
//! - Run 1..=3 workers that filter, transform and act through a `Provider`
//! - Persist stream resume cursors

pub mod actions;
pub mod backoff;
pub mod config;
pub mod cursor;
pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod providers;

pub use actions::{create_system_actions, BenchmarkingSystemActions, LogSystemActions, OperationCount};
pub use backoff::Backoff;
pub use config::{BackoffConfig, DispatcherConfig, MAX_WORKERS};
pub use cursor::{CursorStore, FileCursorStore, MemoryCursorStore};
pub use dispatcher::{DispatcherBuilder, IngestionDispatcher};
pub use error::{DispatcherError, Result};
pub use handle::StreamSinkHandle;
pub use metrics::{DispatchMetrics, DispatchMetricsSnapshot};
pub use providers::{
    AggregationConfig, BootStateConfig, BootStateProvider, InventoryProvider, ProviderConstructor,
    ProviderRegistry, RasEventConfig, RasEventProvider, TelemetryConfig, TelemetryProvider,
};
