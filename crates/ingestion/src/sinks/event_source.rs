//! SSE-backed stream sink
//!
//! Wraps an [`EventStreamClient`] running on a dedicated thread. The sink
//! filters events by subject, forwards the rest to the delegate and reports
//! every event id through the location callback.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use contracts::{
    SinkMessageCallback, StreamConnectionState, StreamLocationCallback, StreamSink,
    TokenAuthentication, TransportArguments, REQUEST_BUILDER_SELECTORS_KEY,
    TOKEN_AUTH_PROVIDER_KEY,
};
use reqwest::Url;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::auth::TokenProviderRegistry;
use crate::config::{subject_allowed, ArgumentReader, StreamMetrics, StreamMetricsSnapshot};
use crate::error::{IngestionError, Result, SseError};
use crate::sse::{
    EventSourceHandlers, EventStreamClient, EventStreamConfig, SseEvent, DEFAULT_BUFFER_SIZE,
    DEFAULT_RETRY_DELAY,
};

/// Selector reported alongside resume positions
pub const STREAM_ID_SELECTOR: &str = "stream_id";

const TOKEN_SERVER_KEY: &str = "tokenServer";
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(15);
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Stream sink reading a Server-Sent-Events endpoint
pub struct EventSourceSink {
    shared: Arc<SinkShared>,
    base_config: EventStreamConfig,
    auth: Option<Arc<dyn TokenAuthentication>>,
    stop_timeout: Duration,
    worker: Mutex<Option<Worker>>,
}

/// State visible to the client thread
struct SinkShared {
    stream: String,
    subjects: Vec<String>,
    resume_key: String,
    selector: Option<String>,
    delegate: RwLock<Option<SinkMessageCallback>>,
    location_callback: RwLock<Option<StreamLocationCallback>>,
    location_id: Mutex<Option<String>>,
    listening: AtomicBool,
    stopped: AtomicBool,
    generation: AtomicU64,
    metrics: StreamMetrics,
}

struct Worker {
    client: Arc<EventStreamClient>,
    thread: JoinHandle<()>,
}

impl EventSourceSink {
    /// Factory name
    pub const NAME: &'static str = "eventSource";

    /// Build a sink from flattened stream arguments.
    ///
    /// A token provider is created when both `tokenAuthProvider` and
    /// `tokenServer` are present; failing to create it is an error.
    pub fn from_args(
        stream: &str,
        args: &TransportArguments,
        tokens: &TokenProviderRegistry,
    ) -> Result<Self> {
        let reader = ArgumentReader::new(stream, args);
        let url = stream_url(&reader)?;

        let selectors = reader.with_prefix(REQUEST_BUILDER_SELECTORS_KEY);
        let url = with_query(url, &selectors);
        let selector = url
            .query_pairs()
            .find(|(name, _)| name == STREAM_ID_SELECTOR)
            .map(|(_, value)| value.into_owned());

        let mut config = EventStreamConfig::new(url.as_str());
        config.buffer_size = reader.parse_or("inputBufferSize", DEFAULT_BUFFER_SIZE)?;
        config.retry_delay = reader.millis_or("retryDelayMs", DEFAULT_RETRY_DELAY)?;
        config.extra_headers = reader.with_prefix("requestHeaders");
        let stop_timeout = reader.millis_or("stopTimeoutMs", DEFAULT_STOP_TIMEOUT)?;

        let auth = match (
            reader.optional(TOKEN_AUTH_PROVIDER_KEY),
            reader.optional(TOKEN_SERVER_KEY),
        ) {
            (Some(provider), Some(_)) => Some(tokens.create(provider, args)?),
            _ => None,
        };

        let shared = SinkShared {
            stream: stream.to_string(),
            subjects: reader.subjects(),
            resume_key: url.path().to_string(),
            selector,
            delegate: RwLock::new(None),
            location_callback: RwLock::new(None),
            location_id: Mutex::new(reader.optional("lastId").map(str::to_string)),
            listening: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            metrics: StreamMetrics::new(),
        };

        debug!(
            stream = %stream,
            url = %url,
            subjects = ?shared.subjects,
            authenticated = auth.is_some(),
            "event source sink configured"
        );

        Ok(Self {
            shared: Arc::new(shared),
            base_config: config,
            auth,
            stop_timeout,
            worker: Mutex::new(None),
        })
    }

    /// Target URL including selector query parameters
    pub fn url(&self) -> &str {
        &self.base_config.url
    }

    pub fn metrics(&self) -> StreamMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn spawn_worker(&self) -> Option<Worker> {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut config = self.base_config.clone();
        config.last_event_id = self.shared.current_location_id();

        let handlers = Arc::new(GenerationHandlers {
            shared: Arc::clone(&self.shared),
            generation,
        });
        let mut client = EventStreamClient::new(config, handlers);
        if let Some(auth) = &self.auth {
            client = client.with_token_provider(Arc::clone(auth));
        }
        let client = Arc::new(client);
        let runner = Arc::clone(&client);

        match std::thread::Builder::new()
            .name(format!("sse-{}", self.shared.stream))
            .spawn(move || runner.run())
        {
            Ok(thread) => Some(Worker { client, thread }),
            Err(e) => {
                error!(stream = %self.shared.stream, error = %e, "failed to spawn stream thread");
                None
            }
        }
    }
}

impl StreamSink for EventSourceSink {
    fn name(&self) -> &str {
        &self.shared.stream
    }

    fn provider_name(&self) -> &str {
        Self::NAME
    }

    fn subjects(&self) -> &[String] {
        &self.shared.subjects
    }

    fn set_callback_delegate(&self, callback: SinkMessageCallback) {
        *self
            .shared
            .delegate
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    #[instrument(name = "sink_start_listening", skip(self), fields(stream = %self.shared.stream))]
    fn start_listening(&self) {
        let mut slot = self.worker_slot();
        if let Some(worker) = slot.as_ref() {
            if !worker.thread.is_finished() && !worker.client.state().is_terminal() {
                trace!("stream thread already running");
                return;
            }
        }

        self.shared.stopped.store(false, Ordering::SeqCst);
        *slot = self.spawn_worker();
        if slot.is_some() {
            info!(url = %self.base_config.url, "stream thread started");
        }
    }

    #[instrument(name = "sink_stop_listening", skip(self), fields(stream = %self.shared.stream))]
    fn stop_listening(&self) {
        let worker = self.worker_slot().take();
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.set_listening(false);

        let Some(worker) = worker else {
            return;
        };
        worker.client.stop();

        let deadline = Instant::now() + self.stop_timeout;
        while !worker.thread.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "stream thread did not exit in time, detaching"
                );
                return;
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }
        if worker.thread.join().is_err() {
            error!("stream thread panicked");
        }
        info!("stream stopped");
    }

    fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> StreamConnectionState {
        match self.worker_slot().as_ref() {
            Some(worker) => worker.client.state(),
            None if self.shared.stopped.load(Ordering::SeqCst) => StreamConnectionState::Closed,
            None => StreamConnectionState::Initial,
        }
    }

    fn set_stream_location_callback(&self, callback: StreamLocationCallback) {
        *self
            .shared
            .location_callback
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    fn set_location_id(&self, id: &str) {
        *self
            .shared
            .location_id
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(id.to_string());
    }

    fn location_id(&self) -> Option<String> {
        self.shared.current_location_id()
    }

    fn resume_key(&self) -> Option<String> {
        Some(self.shared.resume_key.clone())
    }
}

impl SinkShared {
    fn current_location_id(&self) -> Option<String> {
        self.location_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_listening(&self, listening: bool) {
        self.listening.store(listening, Ordering::SeqCst);
        observability::record_stream_connected(&self.stream, listening);
    }

    fn deliver(&self, event: &SseEvent) {
        if !subject_allowed(&self.subjects, &event.event) {
            self.metrics.record_dropped();
            trace!(stream = %self.stream, subject = %event.event, "subject filtered");
        } else {
            let delegate = self
                .delegate
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            match delegate {
                Some(delegate) => {
                    delegate(&event.event, &event.data);
                    self.metrics.record_delivered();
                }
                None => {
                    self.metrics.record_dropped();
                    warn!(stream = %self.stream, "no callback delegate, message dropped");
                }
            }
        }

        if let Some(id) = event.id.as_deref() {
            *self.location_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(id.to_string());
            let callback = self
                .location_callback
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(callback) = callback {
                callback(id, &self.resume_key, self.selector.as_deref());
            }
        }
    }
}

/// Handlers bound to one spawned client; events from older clients are ignored
struct GenerationHandlers {
    shared: Arc<SinkShared>,
    generation: u64,
}

impl GenerationHandlers {
    fn is_current(&self) -> bool {
        self.shared.generation.load(Ordering::SeqCst) == self.generation
    }
}

impl EventSourceHandlers for GenerationHandlers {
    fn on_connecting(&self) {
        debug!(stream = %self.shared.stream, "connecting");
    }

    fn on_open(&self) {
        if self.is_current() {
            self.shared.metrics.record_opened();
            self.shared.set_listening(true);
            info!(stream = %self.shared.stream, "stream connected");
        }
    }

    fn on_closed(&self) {
        if self.is_current() {
            self.shared.set_listening(false);
            info!(stream = %self.shared.stream, "stream closed");
        }
    }

    fn on_error(&self, error: &SseError) {
        self.shared.metrics.record_error();
        if error.is_transient() {
            debug!(stream = %self.shared.stream, error = %error, "stream unavailable, will retry");
        } else {
            warn!(stream = %self.shared.stream, error = %error, "stream error");
        }
    }

    fn on_debug(&self, message: &str) {
        trace!(stream = %self.shared.stream, "{message}");
    }

    fn on_message(&self, event: &SseEvent) {
        if self.is_current() {
            self.shared.deliver(event);
        }
    }
}

/// `fullUrl`, or a URL assembled from address, port, path and scheme
fn stream_url(reader: &ArgumentReader<'_>) -> Result<Url> {
    let (key, raw) = match reader.optional("fullUrl") {
        Some(full) => ("fullUrl", full.to_string()),
        None => {
            let address = reader.required("connectAddress")?;
            reader.required("connectPort")?;
            let port: u16 = reader.parse_or("connectPort", 0)?;
            let scheme = if reader.parse_or("useSsl", false)? {
                "https"
            } else {
                "http"
            };
            let path = reader.optional("urlPath").unwrap_or("/");
            let path = path.strip_prefix('/').unwrap_or(path);
            ("connectAddress", format!("{scheme}://{address}:{port}/{path}"))
        }
    };

    Url::parse(&raw)
        .map_err(|e| IngestionError::invalid_argument(reader.stream(), key, e.to_string()))
}

fn with_query(mut url: Url, selectors: &[(String, String)]) -> Url {
    if !selectors.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in selectors {
            pairs.append_pair(name, value);
        }
    }
    url
}
