//! IngestionDispatcher - profile activation, dispatch queue and worker pool
//!
//! Sinks push `(subject, payload)` into one unbounded FIFO from their own I/O
//! threads. Workers poll the queue with a bounded idle backoff, re-check the
//! subject against the profile and run the provider's transform/act steps.
//!
//! Shutdown order: [`IngestionDispatcher::stop_all_connections`] first, then
//! [`IngestionDispatcher::shut_down`]. Workers drain whatever is still queued
//! before they exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_channel::{unbounded, Receiver, Sender, TryRecvError};
use contracts::{
    AdapterProfile, ListenerConfig, Provider, RawMessage, SinkMessageCallback, SystemActions,
};
use ingestion::{subject_allowed, SinkFactory};
use observability::{ProcessingStatsAggregator, ProcessingSummary};
use tracing::{debug, error, info, instrument, warn};

use crate::actions::create_system_actions;
use crate::backoff::Backoff;
use crate::config::DispatcherConfig;
use crate::cursor::CursorStore;
use crate::error::{DispatcherError, Result};
use crate::handle::StreamSinkHandle;
use crate::metrics::{DispatchMetrics, DispatchMetricsSnapshot};
use crate::providers::ProviderRegistry;

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Builder for creating an [`IngestionDispatcher`]
pub struct DispatcherBuilder {
    listener_config: ListenerConfig,
    profile: String,
    config: DispatcherConfig,
    sink_factory: Option<SinkFactory>,
    providers: Option<ProviderRegistry>,
    provider: Option<Arc<dyn Provider>>,
    actions: Option<Arc<dyn SystemActions>>,
    cursor_store: Option<Arc<dyn CursorStore>>,
}

impl DispatcherBuilder {
    pub fn new(listener_config: ListenerConfig, profile: impl Into<String>) -> Self {
        Self {
            listener_config,
            profile: profile.into(),
            config: DispatcherConfig::default(),
            sink_factory: None,
            providers: None,
            provider: None,
            actions: None,
            cursor_store: None,
        }
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sink_factory(mut self, factory: SinkFactory) -> Self {
        self.sink_factory = Some(factory);
        self
    }

    pub fn with_provider_registry(mut self, registry: ProviderRegistry) -> Self {
        self.providers = Some(registry);
        self
    }

    /// Use this provider instead of resolving the profile's provider class
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Override the actions chosen by `useBenchmarkingActions`
    pub fn with_system_actions(mut self, actions: Arc<dyn SystemActions>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_cursor_store(mut self, store: Arc<dyn CursorStore>) -> Self {
        self.cursor_store = Some(store);
        self
    }

    /// Resolve the profile and its provider
    #[instrument(name = "dispatcher_builder_build", skip(self), fields(profile = %self.profile))]
    pub fn build(self) -> Result<IngestionDispatcher> {
        let profile = self
            .listener_config
            .adapter_profiles
            .get(&self.profile)
            .cloned()
            .ok_or_else(|| DispatcherError::UnknownProfile(self.profile.clone()))?;

        let provider = match self.provider {
            Some(provider) => provider,
            None => {
                let class = self.listener_config.provider_class(&profile)?;
                let registry = self.providers.unwrap_or_default();
                registry
                    .create(class, &self.listener_config.provider_configuration(class))
                    .ok_or_else(|| DispatcherError::UnknownProvider {
                        profile: self.profile.clone(),
                        class: class.to_string(),
                    })??
            }
        };

        let actions = self.actions.unwrap_or_else(|| {
            create_system_actions(self.listener_config.use_benchmarking_actions)
        });
        let (queue_tx, queue_rx) = unbounded();

        info!(
            provider = %provider.name(),
            streams = profile.network_streams_ref.len(),
            subjects = ?profile.subjects,
            "dispatcher built"
        );

        Ok(IngestionDispatcher {
            profile_name: self.profile,
            profile,
            listener_config: self.listener_config,
            config: self.config,
            provider,
            actions,
            sink_factory: self.sink_factory.unwrap_or_default(),
            cursor_store: self.cursor_store,
            queue_tx,
            queue_rx,
            handles: Mutex::new(Vec::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(DispatchMetrics::new()),
            stats: Mutex::new(ProcessingStatsAggregator::new()),
        })
    }
}

/// Runs one adapter profile
pub struct IngestionDispatcher {
    profile_name: String,
    profile: AdapterProfile,
    listener_config: ListenerConfig,
    config: DispatcherConfig,
    provider: Arc<dyn Provider>,
    actions: Arc<dyn SystemActions>,
    sink_factory: SinkFactory,
    cursor_store: Option<Arc<dyn CursorStore>>,
    queue_tx: Sender<RawMessage>,
    queue_rx: Receiver<RawMessage>,
    handles: Mutex<Vec<Arc<StreamSinkHandle>>>,
    shutdown: Arc<AtomicBool>,
    /// Set once by `stop_all_connections`; no sink is started afterwards
    stop_requested: Arc<AtomicBool>,
    metrics: Arc<DispatchMetrics>,
    stats: Mutex<ProcessingStatsAggregator>,
}

impl IngestionDispatcher {
    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    pub fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Create, wire and start one sink per network stream of the profile.
    ///
    /// Unknown transports are skipped. Sinks that have not connected after the
    /// stabilization interval are restarted periodically from a background
    /// thread until they connect or the dispatcher stops. Once
    /// [`stop_all_connections`](Self::stop_all_connections) has been called no
    /// further sink is started.
    #[instrument(name = "dispatcher_start_all_connections", skip(self), fields(profile = %self.profile_name))]
    pub fn start_all_connections(&self) -> Result<()> {
        let mut started = Vec::new();

        for stream in &self.profile.network_streams_ref {
            if self.is_stopping() {
                break;
            }

            let stream_config = self.listener_config.network_stream(stream)?;
            let arguments = self
                .listener_config
                .network_arguments(stream, &self.profile.subjects)?;

            let sink = match self
                .sink_factory
                .create(&stream_config.name, stream, &arguments)
            {
                Ok(Some(sink)) => sink,
                Ok(None) => {
                    warn!(stream = %stream, transport = %stream_config.name, "unknown transport, stream skipped");
                    continue;
                }
                Err(e) => return Err(DispatcherError::sink_creation(stream, e.to_string())),
            };

            if let Some(store) = &self.cursor_store {
                if let Some(id) = sink.resume_key().and_then(|key| store.load(&key)) {
                    debug!(stream = %stream, cursor = %id, "resuming from stored cursor");
                    sink.set_location_id(&id);
                }
                let store = Arc::clone(store);
                sink.set_stream_location_callback(Arc::new(move |id, path, selector| {
                    store.save(id, path, selector)
                }));
            }

            sink.set_callback_delegate(self.message_callback());
            let handle = Arc::new(StreamSinkHandle::new(
                stream.as_str(),
                stream_config.name.as_str(),
                arguments,
                sink,
            ));

            // The stop pass sets the flag before taking this lock, so a sink is
            // either registered here and stopped there, or never started.
            let mut handles = self.lock_handles();
            if self.is_stopping() {
                debug!(stream = %stream, "stop requested, sink not started");
                break;
            }
            handle.start();
            handles.push(Arc::clone(&handle));
            drop(handles);
            started.push(handle);
        }

        if self.is_stopping() {
            info!(sinks = started.len(), "stop requested during start-up");
            return Ok(());
        }

        info!(sinks = started.len(), "all sinks started, waiting for connections");
        self.sleep_unless_stopped(self.config.stabilization_interval);

        let pending: Vec<Arc<StreamSinkHandle>> = started
            .into_iter()
            .filter(|handle| !handle.is_connected())
            .collect();
        if pending.is_empty() {
            info!("all sinks connected");
        } else {
            warn!(
                pending = ?pending.iter().map(|h| h.name()).collect::<Vec<_>>(),
                "sinks not connected yet, retrying in background"
            );
            self.spawn_reconnect_loop(pending);
        }
        Ok(())
    }

    fn spawn_reconnect_loop(&self, mut pending: Vec<Arc<StreamSinkHandle>>) {
        let shutdown = Arc::clone(&self.shutdown);
        let stop_requested = Arc::clone(&self.stop_requested);
        let interval = self.config.reconnect_interval;
        let running =
            move || !shutdown.load(Ordering::SeqCst) && !stop_requested.load(Ordering::SeqCst);

        let spawned = std::thread::Builder::new()
            .name("sink-reconnect".to_string())
            .spawn(move || {
                while running() {
                    if !sleep_while(interval, &running) {
                        break;
                    }
                    pending.retain(|handle| !handle.is_connected());
                    if pending.is_empty() {
                        info!("all pending sinks connected");
                        break;
                    }
                    for handle in &pending {
                        debug!(stream = %handle.name(), "restarting sink");
                        handle.start();
                    }
                }
            });
        if let Err(e) = spawned {
            error!(error = %e, "failed to spawn sink reconnect thread");
        }
    }

    /// Shared sink callback: enqueue without blocking
    pub fn process_sink_message(&self, subject: &str, message: &str) {
        enqueue(&self.queue_tx, &self.metrics, subject, message);
    }

    fn message_callback(&self) -> SinkMessageCallback {
        let tx = self.queue_tx.clone();
        let metrics = Arc::clone(&self.metrics);
        Arc::new(move |subject, payload| enqueue(&tx, &metrics, subject, payload))
    }

    /// Run the worker pool until shutdown; the calling thread is one of the workers
    #[instrument(name = "dispatcher_process_queue", skip(self), fields(profile = %self.profile_name))]
    pub fn process_data_queue_threaded(&self) {
        let workers = self.config.effective_worker_count();
        info!(workers, "queue workers starting");

        if workers == 1 {
            self.worker_loop(0);
        } else {
            std::thread::scope(|scope| {
                for id in 1..workers {
                    let spawned = std::thread::Builder::new()
                        .name(format!("dispatch-worker-{id}"))
                        .spawn_scoped(scope, move || self.worker_loop(id));
                    if let Err(e) = spawned {
                        error!(worker = id, error = %e, "failed to spawn worker");
                    }
                }
                self.worker_loop(0);
            });
        }

        self.actions.close();
        info!(
            processed = self.metrics.processed_count(),
            "queue workers finished"
        );
    }

    fn worker_loop(&self, worker: usize) {
        debug!(worker, "worker started");
        let mut backoff = Backoff::new(self.config.backoff);
        let mut stats = ProcessingStatsAggregator::new();

        loop {
            match self.queue_rx.try_recv() {
                Ok(message) => {
                    self.metrics.set_queue_len(self.queue_rx.len());
                    self.handle_message(message, &mut stats);
                    backoff.reset();
                }
                Err(TryRecvError::Empty) => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        break;
                    }
                    backoff.wait();
                }
                Err(TryRecvError::Closed) => break,
            }
        }

        self.lock_stats().merge(&stats);
        debug!(worker, processed = stats.messages_processed, "worker stopped");
    }

    /// Subject check, transform, then act on every record
    pub fn process_message(&self, message: RawMessage) {
        let mut stats = ProcessingStatsAggregator::new();
        self.handle_message(message, &mut stats);
        self.lock_stats().merge(&stats);
    }

    /// Per-message work; `stats` is owned by the calling worker
    fn handle_message(&self, message: RawMessage, stats: &mut ProcessingStatsAggregator) {
        let (subject, payload) = message.into_parts();

        if !subject_allowed(&self.profile.subjects, &subject) {
            self.metrics.inc_filtered_count();
            stats.record_filtered();
            observability::record_message_dropped("subject");
            debug!(subject = %subject, "subject not in profile, message dropped");
            return;
        }

        let started = Instant::now();
        match self.provider.transform(&payload) {
            Ok(records) => {
                let count = records.len();
                for record in records {
                    self.provider.act(record, self.actions.as_ref());
                }
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

                self.metrics.inc_processed_count();
                self.metrics.add_records(count);
                stats.update(&subject, count, latency_ms);
                observability::record_records_acted(&subject, &self.profile_name, count);
                observability::record_processing_latency_ms(&subject, latency_ms);
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                stats.record_failure();
                observability::record_transform_failure(&subject);
                observability::record_message_dropped("transform");
                warn!(
                    subject = %subject,
                    provider = %self.provider.name(),
                    error = %e,
                    payload = %preview(&payload, self.config.preview_len),
                    "transform failed, message dropped"
                );
            }
        }
    }

    /// Ask workers to exit once the queue is empty
    pub fn shut_down(&self) {
        if !self.shutdown.swap(true, Ordering::SeqCst) {
            info!(queued = self.queue_rx.len(), "dispatcher shutdown requested");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stop every sink; each stop waits a bounded time for its thread
    #[instrument(name = "dispatcher_stop_all_connections", skip(self))]
    pub fn stop_all_connections(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        let handles: Vec<Arc<StreamSinkHandle>> = self.lock_handles().clone();
        for handle in &handles {
            handle.stop();
        }
        info!(sinks = handles.len(), "all sinks stopped");
    }

    pub fn handles(&self) -> Vec<Arc<StreamSinkHandle>> {
        self.lock_handles().clone()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_rx.len()
    }

    pub fn metrics(&self) -> DispatchMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Statistics merged from every worker that has exited
    pub fn stats_summary(&self) -> ProcessingSummary {
        self.lock_stats().summary()
    }

    fn lock_handles(&self) -> MutexGuard<'_, Vec<Arc<StreamSinkHandle>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_stats(&self) -> MutexGuard<'_, ProcessingStatsAggregator> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_stopping(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn sleep_unless_stopped(&self, duration: Duration) {
        sleep_while(duration, || {
            !self.shutdown.load(Ordering::SeqCst) && !self.is_stopping()
        });
    }
}

fn enqueue(tx: &Sender<RawMessage>, metrics: &DispatchMetrics, subject: &str, payload: &str) {
    match tx.try_send(RawMessage::new(subject, payload)) {
        Ok(()) => {
            let depth = tx.len();
            metrics.inc_received_count();
            metrics.set_queue_len(depth);
            observability::record_message_received(subject);
            observability::record_queue_depth(depth);
        }
        Err(e) => {
            observability::record_message_dropped("queue_closed");
            warn!(subject = %subject, error = %e, "dispatch queue closed, message dropped");
        }
    }
}

/// Sleep up to `duration`; false if `keep_going` turned false first
fn sleep_while(duration: Duration, keep_going: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if !keep_going() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(SHUTDOWN_POLL_INTERVAL));
    }
}

/// First `max_chars` characters of a payload for log lines
fn preview(payload: &str, max_chars: usize) -> String {
    match payload.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &payload[..end]),
        None => payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCursorStore;
    use crate::BackoffConfig;
    use contracts::{
        CommonRecord, NetworkStreamConfig, ProviderError, RecordKind, StreamSink,
        StreamLocationCallback,
    };
    use ingestion::TokenProviderRegistry;
    use serde_json::{json, Map};
    use std::sync::atomic::AtomicUsize;
    use std::sync::{OnceLock, RwLock, Weak};

    /// Records the payload of every acted record; fails on "bad"
    #[derive(Default)]
    struct RecordingProvider {
        acted: Mutex<Vec<String>>,
    }

    impl RecordingProvider {
        fn acted(&self) -> Vec<String> {
            self.acted.lock().unwrap().clone()
        }
    }

    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        fn transform(&self, payload: &str) -> std::result::Result<Vec<CommonRecord>, ProviderError> {
            if payload == "bad" {
                return Err(ProviderError::malformed("bad payload"));
            }
            Ok(vec![CommonRecord::new(0, payload, RecordKind::LogData)])
        }

        fn act(&self, record: CommonRecord, _actions: &dyn SystemActions) {
            self.acted.lock().unwrap().push(record.location().to_string());
        }
    }

    /// In-process sink; connects once it has been started `connect_after` times
    struct MemorySink {
        name: String,
        subjects: Vec<String>,
        connect_after: usize,
        starts: AtomicUsize,
        listening: AtomicBool,
        delegate: RwLock<Option<SinkMessageCallback>>,
        location: Mutex<Option<String>>,
    }

    impl MemorySink {
        fn emit(&self, subject: &str, payload: &str) {
            if let Some(delegate) = self.delegate.read().unwrap().as_ref() {
                delegate(subject, payload);
            }
        }
    }

    impl StreamSink for MemorySink {
        fn name(&self) -> &str {
            &self.name
        }
        fn provider_name(&self) -> &str {
            "memory"
        }
        fn subjects(&self) -> &[String] {
            &self.subjects
        }
        fn set_callback_delegate(&self, callback: SinkMessageCallback) {
            *self.delegate.write().unwrap() = Some(callback);
        }
        fn start_listening(&self) {
            let starts = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
            if starts >= self.connect_after {
                self.listening.store(true, Ordering::SeqCst);
            }
        }
        fn stop_listening(&self) {
            self.listening.store(false, Ordering::SeqCst);
        }
        fn is_listening(&self) -> bool {
            self.listening.load(Ordering::SeqCst)
        }
        fn set_stream_location_callback(&self, _callback: StreamLocationCallback) {}
        fn set_location_id(&self, id: &str) {
            *self.location.lock().unwrap() = Some(id.to_string());
        }
        fn location_id(&self) -> Option<String> {
            self.location.lock().unwrap().clone()
        }
        fn resume_key(&self) -> Option<String> {
            Some(format!("/mem/{}", self.name))
        }
    }

    type Created = Arc<Mutex<Vec<Arc<MemorySink>>>>;
    type CreateHook = Arc<dyn Fn(&str) + Send + Sync>;

    fn memory_factory(connect_after: usize) -> (SinkFactory, Created) {
        memory_factory_with_hook(connect_after, Arc::new(|_: &str| {}))
    }

    /// `hook` runs with the stream name before each sink is handed out
    fn memory_factory_with_hook(connect_after: usize, hook: CreateHook) -> (SinkFactory, Created) {
        let created: Created = Arc::default();
        let registry = created.clone();
        let mut factory = SinkFactory::with_defaults(TokenProviderRegistry::with_defaults());
        factory
            .register(
                "memory",
                Box::new(move |stream, args, _| {
                    hook(stream);
                    let sink = Arc::new(MemorySink {
                        name: stream.to_string(),
                        subjects: vec![args.get("subjects").cloned().unwrap_or_default()],
                        connect_after,
                        starts: AtomicUsize::new(0),
                        listening: AtomicBool::new(false),
                        delegate: RwLock::new(None),
                        location: Mutex::new(None),
                    });
                    registry.lock().unwrap().push(Arc::clone(&sink));
                    let sink: Arc<dyn StreamSink> = sink;
                    Ok(sink)
                }),
            )
            .unwrap();
        (factory, created)
    }

    fn listener_config(subjects: &[&str], streams: &[(&str, &str)]) -> ListenerConfig {
        let mut config = ListenerConfig::default();
        config.adapter_profiles.insert(
            "default".to_string(),
            AdapterProfile {
                adapter_provider: "env".to_string(),
                network_streams_ref: streams.iter().map(|(s, _)| s.to_string()).collect(),
                subjects: subjects.iter().map(|s| s.to_string()).collect(),
            },
        );
        for (stream, transport) in streams {
            config.network_streams.insert(
                stream.to_string(),
                NetworkStreamConfig {
                    name: transport.to_string(),
                    arguments: Map::new(),
                },
            );
        }
        config
            .provider_class_map
            .insert("env".to_string(), "telemetry".to_string());
        config
    }

    fn fast_config(workers: usize) -> DispatcherConfig {
        DispatcherConfig {
            stabilization_interval: Duration::from_millis(20),
            reconnect_interval: Duration::from_millis(20),
            worker_count: Some(workers),
            backoff: BackoffConfig {
                unit: Duration::from_micros(100),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn dispatcher(
        config: ListenerConfig,
        provider: Arc<RecordingProvider>,
        workers: usize,
    ) -> IngestionDispatcher {
        DispatcherBuilder::new(config, "default")
            .with_config(fast_config(workers))
            .with_provider(provider)
            .build()
            .unwrap()
    }

    #[test]
    fn test_unknown_profile() {
        let result = DispatcherBuilder::new(ListenerConfig::default(), "missing").build();
        assert!(matches!(result, Err(DispatcherError::UnknownProfile(_))));
    }

    #[test]
    fn test_unknown_provider_class() {
        let mut config = listener_config(&["*"], &[]);
        config
            .provider_class_map
            .insert("env".to_string(), "com.example.Missing".to_string());
        let result = DispatcherBuilder::new(config, "default").build();
        assert!(matches!(result, Err(DispatcherError::UnknownProvider { .. })));
    }

    #[test]
    fn test_builds_registered_provider() {
        let dispatcher = DispatcherBuilder::new(listener_config(&["*"], &[]), "default")
            .build()
            .unwrap();
        assert_eq!(dispatcher.provider_name(), "telemetry");
        assert_eq!(dispatcher.profile_name(), "default");
    }

    #[test]
    fn test_subject_filtering() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher(listener_config(&["telemetry"], &[]), provider.clone(), 1);

        dispatcher.process_sink_message("logs", "l1");
        dispatcher.process_sink_message("telemetry", "t1");
        dispatcher.process_sink_message("logs", "l2");
        dispatcher.shut_down();
        dispatcher.process_data_queue_threaded();

        assert_eq!(provider.acted(), vec!["t1"]);
        let metrics = dispatcher.metrics();
        assert_eq!(metrics.received_count, 3);
        assert_eq!(metrics.filtered_count, 2);
        assert_eq!(metrics.processed_count, 1);
    }

    #[test]
    fn test_wildcard_passes_everything() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher(listener_config(&["*"], &[]), provider.clone(), 1);

        dispatcher.process_sink_message("logs", "a");
        dispatcher.process_sink_message("anything", "b");
        dispatcher.shut_down();
        dispatcher.process_data_queue_threaded();

        assert_eq!(provider.acted(), vec!["a", "b"]);
    }

    #[test]
    fn test_transform_failure_drops_message() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher(listener_config(&["*"], &[]), provider.clone(), 1);

        dispatcher.process_sink_message("s", "one");
        dispatcher.process_sink_message("s", "bad");
        dispatcher.process_sink_message("s", "two");
        dispatcher.shut_down();
        dispatcher.process_data_queue_threaded();

        assert_eq!(provider.acted(), vec!["one", "two"]);
        assert_eq!(dispatcher.metrics().failure_count, 1);
        let summary = dispatcher.stats_summary();
        assert_eq!(summary.transform_failures, 1);
        assert_eq!(summary.messages_processed, 2);
    }

    #[test]
    fn test_shutdown_drains_queue_with_workers() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher(listener_config(&["*"], &[]), provider.clone(), 3);

        for i in 0..200 {
            dispatcher.process_sink_message("s", &format!("m{i}"));
        }
        dispatcher.shut_down();
        dispatcher.process_data_queue_threaded();

        let mut acted = provider.acted();
        acted.sort();
        assert_eq!(acted.len(), 200);
        acted.dedup();
        assert_eq!(acted.len(), 200);
        assert_eq!(dispatcher.queue_len(), 0);
    }

    #[test]
    fn test_workers_exit_on_shutdown() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = Arc::new(dispatcher(listener_config(&["*"], &[]), provider, 2));

        let runner = Arc::clone(&dispatcher);
        let workers = std::thread::spawn(move || runner.process_data_queue_threaded());
        std::thread::sleep(Duration::from_millis(50));
        dispatcher.process_sink_message("s", "late");
        dispatcher.shut_down();

        workers.join().unwrap();
        assert!(dispatcher.is_shut_down());
        assert_eq!(dispatcher.metrics().processed_count, 1);
    }

    #[test]
    fn test_start_all_connections_wires_sinks() {
        let (factory, created) = memory_factory(1);
        let provider = Arc::new(RecordingProvider::default());
        let config = listener_config(&["telemetry"], &[("s1", "memory"), ("s2", "kafka")]);
        let cursors = Arc::new(MemoryCursorStore::new());
        cursors.save("9", "/mem/s1", None);

        let dispatcher = DispatcherBuilder::new(config, "default")
            .with_config(fast_config(1))
            .with_provider(provider.clone())
            .with_sink_factory(factory)
            .with_cursor_store(cursors)
            .build()
            .unwrap();
        dispatcher.start_all_connections().unwrap();

        let handles = dispatcher.handles();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].name(), "s1");
        assert_eq!(handles[0].transport(), "memory");
        assert_eq!(handles[0].cursor().as_deref(), Some("9"));
        assert!(handles[0].is_connected());

        let sink = created.lock().unwrap()[0].clone();
        assert_eq!(sink.subjects(), &["telemetry".to_string()]);
        sink.emit("telemetry", "from-sink");

        dispatcher.stop_all_connections();
        assert!(!handles[0].is_connected());
        dispatcher.shut_down();
        dispatcher.process_data_queue_threaded();
        assert_eq!(provider.acted(), vec!["from-sink"]);
    }

    #[test]
    fn test_slow_sinks_restarted_in_background() {
        let (factory, created) = memory_factory(3);
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = DispatcherBuilder::new(
            listener_config(&["*"], &[("slow", "memory")]),
            "default",
        )
        .with_config(fast_config(1))
        .with_provider(provider)
        .with_sink_factory(factory)
        .build()
        .unwrap();

        dispatcher.start_all_connections().unwrap();
        let sink = created.lock().unwrap()[0].clone();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !sink.is_listening() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(sink.is_listening());
        assert!(sink.starts.load(Ordering::SeqCst) >= 3);

        dispatcher.stop_all_connections();
        dispatcher.shut_down();
    }

    #[test]
    fn test_stop_during_start_up_leaves_no_sink_running() {
        let target: Arc<OnceLock<Weak<IngestionDispatcher>>> = Arc::default();
        let hook_target = Arc::clone(&target);
        let (factory, created) = memory_factory_with_hook(
            1,
            Arc::new(move |stream: &str| {
                if stream == "s2" {
                    if let Some(dispatcher) = hook_target.get().and_then(Weak::upgrade) {
                        dispatcher.stop_all_connections();
                    }
                }
            }),
        );
        let provider = Arc::new(RecordingProvider::default());
        let config = listener_config(
            &["*"],
            &[("s1", "memory"), ("s2", "memory"), ("s3", "memory")],
        );
        let dispatcher = Arc::new(
            DispatcherBuilder::new(config, "default")
                .with_config(fast_config(1))
                .with_provider(provider)
                .with_sink_factory(factory)
                .build()
                .unwrap(),
        );
        target.set(Arc::downgrade(&dispatcher)).unwrap();

        dispatcher.start_all_connections().unwrap();

        let handles = dispatcher.handles();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].name(), "s1");
        assert!(!handles[0].is_connected());

        let created = created.lock().unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].name(), "s2");
        assert_eq!(created[1].starts.load(Ordering::SeqCst), 0);
        assert!(created.iter().all(|sink| !sink.is_listening()));

        // A later start-up pass does not re-arm the stopped dispatcher
        dispatcher.start_all_connections().unwrap();
        assert_eq!(dispatcher.handles().len(), 1);
        assert!(created.iter().all(|sink| !sink.is_listening()));
    }

    #[test]
    fn test_each_source_keeps_its_order() {
        let (factory, created) = memory_factory(1);
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = Arc::new(
            DispatcherBuilder::new(
                listener_config(&["*"], &[("a", "memory"), ("b", "memory")]),
                "default",
            )
            .with_config(fast_config(1))
            .with_provider(provider.clone())
            .with_sink_factory(factory)
            .build()
            .unwrap(),
        );
        dispatcher.start_all_connections().unwrap();

        let sinks = created.lock().unwrap().clone();
        let emitters: Vec<_> = sinks
            .into_iter()
            .map(|sink| {
                std::thread::spawn(move || {
                    let prefix = sink.name().to_string();
                    let count = if prefix == "a" { 3 } else { 2 };
                    for i in 1..=count {
                        sink.emit("s", &format!("{prefix}{i}"));
                    }
                })
            })
            .collect();
        for emitter in emitters {
            emitter.join().unwrap();
        }

        dispatcher.stop_all_connections();
        dispatcher.shut_down();
        dispatcher.process_data_queue_threaded();

        let acted = provider.acted();
        let from = |prefix: char| -> Vec<String> {
            acted
                .iter()
                .filter(|payload| payload.starts_with(prefix))
                .cloned()
                .collect()
        };
        assert_eq!(from('a'), vec!["a1", "a2", "a3"]);
        assert_eq!(from('b'), vec!["b1", "b2"]);
        assert_eq!(acted.len(), 5);
    }

    #[test]
    fn test_worker_stats_merged_on_exit() {
        let provider = Arc::new(RecordingProvider::default());
        let dispatcher = dispatcher(listener_config(&["t"], &[]), provider, 3);

        for i in 0..60 {
            dispatcher.process_sink_message("t", &format!("m{i}"));
        }
        dispatcher.process_sink_message("t", "bad");
        dispatcher.process_sink_message("other", "x");
        dispatcher.shut_down();
        dispatcher.process_data_queue_threaded();

        let summary = dispatcher.stats_summary();
        assert_eq!(summary.messages_processed, 60);
        assert_eq!(summary.records_acted, 60);
        assert_eq!(summary.transform_failures, 1);
        assert_eq!(summary.filtered, 1);
        assert_eq!(summary.latency_ms.count, 60);
        assert_eq!(summary.subject_counts.get("t"), Some(&60));
    }

    #[test]
    fn test_sink_creation_error_is_fatal() {
        let provider = Arc::new(RecordingProvider::default());
        let mut config = listener_config(&["*"], &[("sse", "eventSource")]);
        config.network_streams.insert(
            "sse".to_string(),
            NetworkStreamConfig {
                name: "eventSource".to_string(),
                arguments: json!({ "connectPort": 80 }).as_object().cloned().unwrap(),
            },
        );
        let dispatcher = dispatcher(config, provider, 1);
        let result = dispatcher.start_all_connections();
        assert!(matches!(result, Err(DispatcherError::SinkCreation { .. })));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }
}
