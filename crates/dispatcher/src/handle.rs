//! StreamSinkHandle - one activated network stream of a profile

use std::sync::Arc;

use contracts::{StreamConnectionState, StreamSink, TransportArguments};
use tracing::{debug, instrument};

/// Handle to a sink created for one network stream
pub struct StreamSinkHandle {
    /// Network stream name
    stream: String,
    /// Factory name the sink was built from
    transport: String,
    /// Resolved transport arguments
    arguments: TransportArguments,
    sink: Arc<dyn StreamSink>,
}

impl StreamSinkHandle {
    pub fn new(
        stream: impl Into<String>,
        transport: impl Into<String>,
        arguments: TransportArguments,
        sink: Arc<dyn StreamSink>,
    ) -> Self {
        Self {
            stream: stream.into(),
            transport: transport.into(),
            arguments,
            sink,
        }
    }

    pub fn name(&self) -> &str {
        &self.stream
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn arguments(&self) -> &TransportArguments {
        &self.arguments
    }

    pub fn sink(&self) -> &Arc<dyn StreamSink> {
        &self.sink
    }

    /// Last state reported by the sink
    pub fn state(&self) -> StreamConnectionState {
        self.sink.connection_state()
    }

    /// Resume cursor (last event id seen)
    pub fn cursor(&self) -> Option<String> {
        self.sink.location_id()
    }

    pub fn is_connected(&self) -> bool {
        self.sink.is_listening()
    }

    /// Idempotent: a running transport is left alone
    pub fn start(&self) {
        self.sink.start_listening();
    }

    #[instrument(name = "stream_handle_stop", skip(self), fields(stream = %self.stream))]
    pub fn stop(&self) {
        self.sink.stop_listening();
        debug!(cursor = ?self.cursor(), "stream handle stopped");
    }
}

impl std::fmt::Debug for StreamSinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSinkHandle")
            .field("stream", &self.stream)
            .field("transport", &self.transport)
            .field("state", &self.state())
            .field("cursor", &self.cursor())
            .finish()
    }
}
