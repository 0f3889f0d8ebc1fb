//! # Ingestion
//!
//! Inbound transports for monitoring data.
//!
//! Responsibilities:
//! - Reconnecting SSE client with `Last-Event-ID` resume ([`sse`])
//! - Stream sinks built from network stream arguments ([`EventSourceSink`], [`BenchmarkSink`])
//! - Transport and token provider registries ([`SinkFactory`], [`TokenProviderRegistry`])
//!
//! ## Usage
//!
//! ```ignore
//! use ingestion::SinkFactory;
//!
//! let factory = SinkFactory::default();
//! let args = config.network_arguments("events", &profile.subjects)?;
//! if let Some(sink) = factory.create("eventSource", "events", &args)? {
//!     sink.set_callback_delegate(callback);
//!     sink.start_listening();
//! }
//! ```

mod auth;
mod config;
mod error;
mod factory;
mod sinks;
pub mod sse;

pub use auth::{FileTokenProvider, StaticTokenProvider, TokenProviderConstructor, TokenProviderRegistry};
pub use config::{
    subject_allowed, ArgumentReader, StreamMetrics, StreamMetricsSnapshot, WILDCARD_SUBJECT,
};
pub use error::{IngestionError, Result, SseError};
pub use factory::{SinkConstructor, SinkFactory, SSE_ALIAS};
pub use sinks::{BenchmarkSink, EventSourceSink, STREAM_ID_SELECTOR};
