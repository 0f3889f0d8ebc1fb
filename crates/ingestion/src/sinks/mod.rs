//! Stream sink implementations

mod benchmark;
mod event_source;

pub use benchmark::BenchmarkSink;
pub use event_source::{EventSourceSink, STREAM_ID_SELECTOR};
