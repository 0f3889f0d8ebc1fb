//! StreamSink trait - inbound data stream abstraction
//!
//! Decouples the dispatcher from concrete transports (SSE, file replay, ...).
//! Every sink exposes the same start/stop/callback contract.

use std::collections::HashMap;
use std::sync::Arc;

use crate::StreamConnectionState;

/// Flattened connection arguments of one network stream (string → string)
pub type TransportArguments = HashMap<String, String>;

/// Receives `(subject, payload)` for every message a sink delivers.
///
/// Called on the sink's I/O thread; implementations must hand off quickly.
pub type SinkMessageCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Receives `(id, stream_path, selector)` after each dispatched event so the
/// caller can persist the resume position of a stream.
pub type StreamLocationCallback = Arc<dyn Fn(&str, &str, Option<&str>) + Send + Sync>;

/// Inbound stream endpoint.
///
/// All methods take `&self` so a sink can be shared between the control
/// thread and background reconnect loops.
///
/// # Example
///
/// ```ignore
/// let sink: Arc<dyn StreamSink> = factory.create("eventSource", "events", &args)?.unwrap();
/// sink.set_callback_delegate(Arc::new(|subject, payload| {
///     println!("{subject}: {payload}");
/// }));
/// sink.start_listening();
/// // ...
/// sink.stop_listening();
/// ```
pub trait StreamSink: Send + Sync {
    /// Name of the network stream this sink serves
    fn name(&self) -> &str;

    /// Factory name of the transport implementation
    fn provider_name(&self) -> &str;

    /// Subjects this sink forwards (`*` means all)
    fn subjects(&self) -> &[String];

    /// Register the downstream handler.
    ///
    /// Must be set before `start_listening` or early messages are dropped.
    fn set_callback_delegate(&self, callback: SinkMessageCallback);

    /// Start the transport. Idempotent: while a transport thread is alive,
    /// repeated calls do nothing.
    fn start_listening(&self);

    /// Stop the transport and wait a bounded time for it to exit.
    fn stop_listening(&self);

    /// True while the transport reports an open connection
    fn is_listening(&self) -> bool;

    /// Current connection lifecycle state
    fn connection_state(&self) -> StreamConnectionState {
        if self.is_listening() {
            StreamConnectionState::Open
        } else {
            StreamConnectionState::Initial
        }
    }

    /// Register the resume-position callback. Sinks without a cursor ignore it.
    fn set_stream_location_callback(&self, _callback: StreamLocationCallback) {}

    /// Seed the resume position used on the next connection
    fn set_location_id(&self, _id: &str) {}

    /// Last known resume position
    fn location_id(&self) -> Option<String> {
        None
    }

    /// Key under which this sink's resume position is persisted
    fn resume_key(&self) -> Option<String> {
        None
    }
}
