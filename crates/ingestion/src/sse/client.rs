//! Reconnecting Server-Sent-Events client
//!
//! One instance owns one outbound HTTP streaming connection. [`EventStreamClient::run`]
//! blocks the calling thread in a reconnect loop until [`EventStreamClient::stop`]
//! is called from any thread.
//!
//! Certificates are not verified: the client targets management endpoints on
//! private cluster networks that commonly use self-signed certificates.

use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{StreamConnectionState, TokenAuthentication};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};

use crate::error::SseError;
use crate::sse::parser::{SseEvent, SseLineParser};

/// Delay between connection attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);
/// Read buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";
const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connection settings
#[derive(Debug, Clone)]
pub struct EventStreamConfig {
    /// Full URL including query parameters
    pub url: String,
    /// Id sent as `Last-Event-ID` on the first connection
    pub last_event_id: Option<String>,
    /// Read buffer size, values below 1 fall back to the default
    pub buffer_size: usize,
    /// Fixed wait between attempts
    pub retry_delay: Duration,
    /// TCP/TLS connect timeout (reads never time out)
    pub connect_timeout: Duration,
    /// Additional request headers
    pub extra_headers: Vec<(String, String)>,
}

impl EventStreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            last_event_id: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            retry_delay: DEFAULT_RETRY_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            extra_headers: Vec::new(),
        }
    }
}

/// Lifecycle callbacks, invoked on the client's own thread.
///
/// `on_message` runs synchronously inside the read loop and should hand the
/// event off quickly.
pub trait EventSourceHandlers: Send + Sync {
    fn on_connecting(&self) {}

    fn on_open(&self);

    /// The current attempt ended (stream closed or fatal response)
    fn on_closed(&self);

    /// Non-fatal unless followed by `on_closed`
    fn on_error(&self, error: &SseError);

    fn on_debug(&self, _message: &str) {}

    fn on_message(&self, event: &SseEvent);
}

/// Lock-free connection state shared between the run loop and `stop` callers
#[derive(Debug, Clone, Default)]
pub struct ConnectionStateCell(Arc<AtomicU8>);

impl ConnectionStateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> StreamConnectionState {
        StreamConnectionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn is_closed(&self) -> bool {
        self.get().is_terminal()
    }

    /// Move to `next` unless already closed; returns false if closed.
    pub fn transition(&self, next: StreamConnectionState) -> bool {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            if StreamConnectionState::from_u8(current).is_terminal() {
                return false;
            }
            match self
                .0
                .compare_exchange(current, next.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Enter the terminal state; returns true for the call that closed it
    pub fn close(&self) -> bool {
        self.0
            .swap(StreamConnectionState::Closed.as_u8(), Ordering::SeqCst)
            != StreamConnectionState::Closed.as_u8()
    }
}

/// Reconnecting SSE client
pub struct EventStreamClient {
    config: EventStreamConfig,
    handlers: Arc<dyn EventSourceHandlers>,
    auth: Option<Arc<dyn TokenAuthentication>>,
    state: ConnectionStateCell,
}

impl EventStreamClient {
    pub fn new(config: EventStreamConfig, handlers: Arc<dyn EventSourceHandlers>) -> Self {
        Self {
            config,
            handlers,
            auth: None,
            state: ConnectionStateCell::new(),
        }
    }

    /// Inject a bearer token, fetched once per connection attempt
    pub fn with_token_provider(mut self, auth: Arc<dyn TokenAuthentication>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn state(&self) -> StreamConnectionState {
        self.state.get()
    }

    /// Handle for observing or closing the state from other threads
    pub fn state_cell(&self) -> ConnectionStateCell {
        self.state.clone()
    }

    /// Request the loop to end. Idempotent; does not interrupt a blocked read,
    /// the loop notices at its next line or backoff checkpoint.
    pub fn stop(&self) {
        if self.state.close() {
            self.handlers.on_debug("stop requested");
        }
    }

    /// Reconnect loop; returns once the state is `Closed`
    pub fn run(&self) {
        self.handlers.on_debug("beginning reconnect/retry loop");
        let mut http: Option<Client> = None;
        let mut last_event_id = self.config.last_event_id.clone();

        while !self.state.is_closed() {
            if let Err(e) = self.connect(&mut http, &mut last_event_id) {
                self.handlers.on_error(&e);
                if e.closes_attempt() {
                    self.handlers.on_closed();
                }
            }

            if !self.state.transition(StreamConnectionState::Initial) {
                break;
            }
            self.sleep_unless_closed(self.config.retry_delay);
        }

        self.handlers.on_debug("reconnect loop finished");
    }

    /// One connection attempt, from request to end of stream
    fn connect(
        &self,
        http: &mut Option<Client>,
        last_event_id: &mut Option<String>,
    ) -> Result<(), SseError> {
        let client = self.http_client(http)?;

        if !self.state.transition(StreamConnectionState::Connecting) {
            return Ok(());
        }
        self.handlers.on_connecting();

        let mut request = client
            .get(&self.config.url)
            .header(CACHE_CONTROL, "no-cache")
            .header(ACCEPT, EVENT_STREAM_MEDIA_TYPE);
        for (name, value) in &self.config.extra_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &self.auth {
            let token = auth.token().map_err(SseError::Token)?;
            request = request.bearer_auth(token);
        }
        if let Some(id) = last_event_id.as_deref() {
            self.handlers
                .on_debug(&format!("resuming with {LAST_EVENT_ID_HEADER}: {id}"));
            request = request.header(LAST_EVENT_ID_HEADER, id);
        }

        let response = request.send()?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !status.is_success() || !is_event_stream(&content_type) {
            return Err(SseError::UnexpectedResponse {
                status: status.as_u16(),
                content_type,
            });
        }

        if !self.state.transition(StreamConnectionState::Open) {
            return Ok(());
        }
        self.handlers.on_open();

        let result = self.read_stream(response, last_event_id);
        self.handlers.on_closed();
        result
    }

    fn read_stream(
        &self,
        response: Response,
        last_event_id: &mut Option<String>,
    ) -> Result<(), SseError> {
        let reader = BufReader::with_capacity(self.buffer_size(), response);
        let mut parser = SseLineParser::with_last_event_id(last_event_id.clone());

        for line in reader.lines() {
            let line = line?;
            if let Some(event) = parser.push_line(&line) {
                last_event_id.clone_from(&event.id);
                self.handlers.on_message(&event);
            }
            if self.state.is_closed() {
                break;
            }
        }

        Ok(())
    }

    /// Build the HTTP client on first use, reuse it afterwards
    fn http_client(&self, slot: &mut Option<Client>) -> Result<Client, SseError> {
        if let Some(client) = slot {
            return Ok(client.clone());
        }

        self.handlers.on_debug("creating permissive TLS client");
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(self.config.connect_timeout)
            .timeout(None::<Duration>)
            .build()
            .map_err(SseError::ClientBuild)?;
        *slot = Some(client.clone());
        Ok(client)
    }

    fn buffer_size(&self) -> usize {
        if self.config.buffer_size < 1 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.config.buffer_size
        }
    }

    fn sleep_unless_closed(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.state.is_closed() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
        }
    }
}

/// Compare the media type only, ignoring parameters such as `charset`
fn is_event_stream(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|media| media.trim().eq_ignore_ascii_case(EVENT_STREAM_MEDIA_TYPE))
        .unwrap_or(false)
}
