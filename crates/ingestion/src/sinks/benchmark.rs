//! File replay sink used for throughput benchmarking

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};

use contracts::{SinkMessageCallback, StreamSink, TransportArguments};
use tracing::{debug, info, instrument, warn};

use crate::config::{ArgumentReader, StreamMetrics, StreamMetricsSnapshot};
use crate::error::Result;

const DEFAULT_SUBJECT: &str = "events";
const DEFAULT_INITIAL_DELAY_SECS: u64 = 30;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Publishes every line of a file as one message, again whenever the file changes
pub struct BenchmarkSink {
    stream: String,
    subjects: Vec<String>,
    inner: Arc<ReplayState>,
    initial_delay: Duration,
    thread: Mutex<Option<JoinHandle<()>>>,
}

struct ReplayState {
    stream: String,
    path: PathBuf,
    subject: String,
    delegate: RwLock<Option<SinkMessageCallback>>,
    running: AtomicBool,
    metrics: StreamMetrics,
}

impl BenchmarkSink {
    pub const NAME: &'static str = "benchmark";

    pub fn from_args(stream: &str, args: &TransportArguments) -> Result<Self> {
        let reader = ArgumentReader::new(stream, args);
        let path = PathBuf::from(reader.required("rawDataFileName")?);
        let subject = reader
            .optional("publishedSubject")
            .unwrap_or(DEFAULT_SUBJECT)
            .to_string();
        let delay = reader.parse_or("initialDelaySeconds", DEFAULT_INITIAL_DELAY_SECS)?;

        Ok(Self {
            stream: stream.to_string(),
            subjects: vec![subject.clone()],
            inner: Arc::new(ReplayState {
                stream: stream.to_string(),
                path,
                subject,
                delegate: RwLock::new(None),
                running: AtomicBool::new(false),
                metrics: StreamMetrics::new(),
            }),
            initial_delay: Duration::from_secs(delay),
            thread: Mutex::new(None),
        })
    }

    /// Override the start delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn metrics(&self) -> StreamMetricsSnapshot {
        self.inner.metrics.snapshot()
    }
}

impl StreamSink for BenchmarkSink {
    fn name(&self) -> &str {
        &self.stream
    }

    fn provider_name(&self) -> &str {
        Self::NAME
    }

    fn subjects(&self) -> &[String] {
        &self.subjects
    }

    fn set_callback_delegate(&self, callback: SinkMessageCallback) {
        *self
            .inner
            .delegate
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    #[instrument(name = "benchmark_start", skip(self), fields(stream = %self.stream))]
    fn start_listening(&self) {
        let mut slot = self.thread.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        self.inner.running.store(true, Ordering::SeqCst);

        let state = Arc::clone(&self.inner);
        let delay = self.initial_delay;
        match std::thread::Builder::new()
            .name(format!("benchmark-{}", self.stream))
            .spawn(move || state.run(delay))
        {
            Ok(handle) => {
                info!(path = %self.inner.path.display(), "benchmark replay scheduled");
                *slot = Some(handle);
            }
            Err(e) => {
                self.inner.running.store(false, Ordering::SeqCst);
                warn!(error = %e, "failed to spawn benchmark thread");
            }
        }
    }

    fn stop_listening(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(stream = %self.stream, "benchmark thread panicked");
            }
        }
    }

    fn is_listening(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }
}

impl ReplayState {
    fn run(&self, initial_delay: Duration) {
        if !self.sleep_while_running(initial_delay) {
            return;
        }

        let mut last_modified = None;
        while self.running.load(Ordering::SeqCst) {
            let modified = modified_time(&self.path);
            if modified.is_some() && modified != last_modified {
                last_modified = modified;
                self.publish_file();
            }
            if !self.sleep_while_running(POLL_INTERVAL) {
                break;
            }
        }
        debug!(stream = %self.stream, "benchmark replay finished");
    }

    fn publish_file(&self) {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read benchmark file");
                return;
            }
        };
        let Some(delegate) = self
            .delegate
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        else {
            warn!(stream = %self.stream, "no callback delegate, replay skipped");
            return;
        };

        let started = Instant::now();
        let mut published = 0u64;
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            delegate(&self.subject, line);
            self.metrics.record_delivered();
            published += 1;
        }
        info!(
            stream = %self.stream,
            published,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "benchmark file published"
        );
    }

    /// False when stopped during the wait
    fn sleep_while_running(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(STOP_CHECK_INTERVAL));
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
