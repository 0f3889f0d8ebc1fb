//! # Integration Tests
//!
//! End-to-end tests for the ingestion adapter.
//!
//! Covers:
//! - SSE stream → dispatcher → provider → system actions
//! - Reconnect and resume through `Last-Event-ID` and the cursor file
//! - Bounded stop and single active connection per sink

#[cfg(test)]
mod support {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;
    use std::time::{Duration, Instant};

    use contracts::{AggregateSummary, BootState, ListenerConfig, SystemActions};
    use dispatcher::{BackoffConfig, DispatcherBuilder, DispatcherConfig, IngestionDispatcher};

    /// What one accepted connection gets: a body, then the socket stays open for `hold`
    #[derive(Clone)]
    pub struct Connection {
        pub body: String,
        pub hold: Duration,
    }

    impl Connection {
        pub fn new(body: impl Into<String>, hold: Duration) -> Self {
            Self {
                body: body.into(),
                hold,
            }
        }
    }

    /// In-process SSE endpoint; connection `n` is served `script[min(n, len - 1)]`
    pub struct SseServer {
        pub url: String,
        requests: Arc<Mutex<Vec<String>>>,
        max_active: Arc<AtomicUsize>,
    }

    impl SseServer {
        pub fn start(script: Vec<Connection>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let url = format!("http://{}/events/stream", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let active = Arc::new(AtomicUsize::new(0));
            let max_active = Arc::new(AtomicUsize::new(0));

            let (req, act, max) = (requests.clone(), active, max_active.clone());
            std::thread::spawn(move || {
                for (n, stream) in listener.incoming().enumerate() {
                    let Ok(mut stream) = stream else { break };
                    let conn = script[n.min(script.len() - 1)].clone();
                    let (req, act, max) = (req.clone(), act.clone(), max.clone());
                    std::thread::spawn(move || {
                        let now = act.fetch_add(1, Ordering::SeqCst) + 1;
                        max.fetch_max(now, Ordering::SeqCst);

                        let mut buf = [0u8; 8192];
                        let n = stream.read(&mut buf).unwrap_or(0);
                        req.lock()
                            .unwrap()
                            .push(String::from_utf8_lossy(&buf[..n]).to_lowercase());
                        let _ = stream.write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\r\n",
                        );
                        let _ = stream.write_all(conn.body.as_bytes());
                        let _ = stream.flush();
                        std::thread::sleep(conn.hold);

                        act.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            });

            Self {
                url,
                requests,
                max_active,
            }
        }

        /// Lowercased request heads, in accept order
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub fn max_active(&self) -> usize {
            self.max_active.load(Ordering::SeqCst)
        }
    }

    /// SSE frame with subject, data and id
    pub fn event(subject: &str, data: &str, id: u64) -> String {
        format!("event: {subject}\ndata: {data}\nid: {id}\n\n")
    }

    /// Telemetry sample carrying `value` for node `R0-CH0-N1`
    pub fn sample(value: u64) -> String {
        format!(
            r#"{{"timestamp":1700000000000000000,"location":"R0-CH0-N1","name":"temp","value":{value}}}"#
        )
    }

    /// Keeps the stored telemetry values in arrival order
    #[derive(Default)]
    pub struct CollectingActions {
        values: Mutex<Vec<f64>>,
        closed: AtomicUsize,
    }

    impl CollectingActions {
        pub fn values(&self) -> Vec<f64> {
            self.values.lock().unwrap().clone()
        }

        pub fn closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst) > 0
        }
    }

    impl SystemActions for CollectingActions {
        fn store_normalized_data(&self, _: &str, _: &str, _: i64, value: f64) {
            self.values.lock().unwrap().push(value);
        }
        fn store_aggregated_data(&self, _: &str, _: &str, _: i64, _: &AggregateSummary) {}
        fn store_ras_event(&self, _: &str, _: &str, _: &str, _: i64) {}
        fn publish_normalized_data(&self, _: &str, _: &str, _: &str, _: i64, _: f64) {}
        fn publish_aggregated_data(&self, _: &str, _: &str, _: &str, _: i64, _: &AggregateSummary) {}
        fn publish_ras_event(&self, _: &str, _: &str, _: &str, _: &str, _: i64) {}
        fn publish_boot_event(&self, _: &str, _: BootState, _: &str, _: i64) {}
        fn change_node_state(&self, _: BootState, _: &str, _: i64, _: bool) {}
        fn upsert_inventory(&self, _: &str, _: &str, _: i64) {}
        fn delete_inventory(&self, _: &str, _: i64) {}
        fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// One telemetry profile named `default` reading a single stream
    pub fn listener_config(transport: &str, arguments: serde_json::Value) -> ListenerConfig {
        let doc = serde_json::json!({
            "adapterProfiles": {
                "default": {
                    "adapterProvider": "environmental",
                    "networkStreamsRef": ["monitoring"],
                    "subjects": ["telemetry"]
                }
            },
            "networkStreams": {
                "monitoring": { "name": transport, "arguments": arguments }
            },
            "subjectMap": { "telemetry": "EnvironmentalData", "logs": "LogData" },
            "providerClassMap": { "environmental": "telemetry" },
            "providerConfigurations": { "telemetry": { "useAggregation": false } }
        });
        config_loader::ConfigLoader::load_from_str(
            &doc.to_string(),
            config_loader::ConfigFormat::Json,
        )
        .unwrap()
    }

    pub fn dispatcher_config(workers: usize) -> DispatcherConfig {
        DispatcherConfig {
            stabilization_interval: Duration::from_millis(50),
            reconnect_interval: Duration::from_millis(50),
            worker_count: Some(workers),
            backoff: BackoffConfig {
                unit: Duration::from_micros(200),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn builder(config: ListenerConfig, workers: usize, actions: Arc<CollectingActions>) -> DispatcherBuilder {
        DispatcherBuilder::new(config, "default")
            .with_config(dispatcher_config(workers))
            .with_system_actions(actions)
    }

    /// Dispatcher with its connections started and workers on a thread
    pub struct Running {
        pub dispatcher: Arc<IngestionDispatcher>,
        workers: JoinHandle<()>,
    }

    impl Running {
        pub fn start(dispatcher: IngestionDispatcher) -> Self {
            let dispatcher = Arc::new(dispatcher);
            dispatcher.start_all_connections().unwrap();
            let runner = Arc::clone(&dispatcher);
            let workers = std::thread::spawn(move || runner.process_data_queue_threaded());
            Self {
                dispatcher,
                workers,
            }
        }

        /// Stop sinks first, then let the workers drain and exit
        pub fn finish(self) -> Arc<IngestionDispatcher> {
            self.dispatcher.stop_all_connections();
            self.dispatcher.shut_down();
            self.workers.join().unwrap();
            self.dispatcher
        }
    }

    pub fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        condition()
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use contracts::StreamConnectionState;
    use dispatcher::{CursorStore, FileCursorStore};
    use serde_json::json;

    use super::support::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn sse_arguments(url: &str) -> serde_json::Value {
        json!({
            "fullUrl": url,
            "retryDelayMs": 100,
            "stopTimeoutMs": 3000,
            "requestBuilderSelectors": { "stream_id": "telemetry" }
        })
    }

    /// SSE events flow through subject filter and provider into system actions
    #[test]
    fn test_e2e_sse_pipeline() {
        let body = [
            event("telemetry", &sample(1), 1),
            event("logs", "node booted", 2),
            event("telemetry", &sample(2), 3),
            event("telemetry", "not json", 4),
        ]
        .concat();
        let server = SseServer::start(vec![Connection::new(body, Duration::from_secs(1))]);
        let actions = Arc::new(CollectingActions::default());

        let dispatcher = builder(
            listener_config("eventSource", sse_arguments(&server.url)),
            1,
            actions.clone(),
        )
        .build()
        .unwrap();
        let running = Running::start(dispatcher);

        assert!(wait_until(TIMEOUT, || running.dispatcher.metrics().failure_count == 1));
        let handles = running.dispatcher.handles();
        assert_eq!(handles.len(), 1);
        assert!(wait_until(TIMEOUT, || handles[0].cursor().as_deref() == Some("4")));

        let dispatcher = running.finish();
        assert_eq!(actions.values(), vec![1.0, 2.0]);
        assert!(actions.closed());
        assert_eq!(handles[0].state(), StreamConnectionState::Closed);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.processed_count, 2);
        assert_eq!(metrics.failure_count, 1);
        // The sink already dropped the `logs` event
        assert_eq!(metrics.received_count, 3);

        let request = &server.requests()[0];
        assert!(request.starts_with("get /events/stream?stream_id=telemetry"));
        assert!(request.contains("accept: text/event-stream"));
    }

    /// A single worker preserves the stream order
    #[test]
    fn test_single_worker_keeps_order() {
        let body: String = (0..50).map(|i| event("telemetry", &sample(i), i)).collect();
        let server = SseServer::start(vec![Connection::new(body, Duration::from_secs(1))]);
        let actions = Arc::new(CollectingActions::default());

        let dispatcher = builder(
            listener_config("eventSource", sse_arguments(&server.url)),
            1,
            actions.clone(),
        )
        .build()
        .unwrap();
        let running = Running::start(dispatcher);
        assert!(wait_until(TIMEOUT, || actions.values().len() == 50));
        running.finish();

        let expected: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(actions.values(), expected);
    }

    /// Two streams feeding one worker keep their own order; interleaving is free
    #[test]
    fn test_order_kept_per_source() {
        let body_a: String = (0..3).map(|i| event("telemetry", &sample(100 + i), i)).collect();
        let body_b: String = (0..2).map(|i| event("telemetry", &sample(200 + i), i)).collect();
        let server_a = SseServer::start(vec![Connection::new(body_a, Duration::from_secs(1))]);
        let server_b = SseServer::start(vec![Connection::new(body_b, Duration::from_secs(1))]);
        let actions = Arc::new(CollectingActions::default());

        let mut config = listener_config("eventSource", sse_arguments(&server_a.url));
        let second = contracts::NetworkStreamConfig {
            name: "eventSource".to_string(),
            arguments: sse_arguments(&server_b.url)
                .as_object()
                .cloned()
                .unwrap(),
        };
        config.network_streams.insert("secondary".to_string(), second);
        config
            .adapter_profiles
            .get_mut("default")
            .unwrap()
            .network_streams_ref
            .push("secondary".to_string());

        let dispatcher = builder(config, 1, actions.clone()).build().unwrap();
        let running = Running::start(dispatcher);
        assert!(wait_until(TIMEOUT, || actions.values().len() == 5));
        let dispatcher = running.finish();
        assert_eq!(dispatcher.handles().len(), 2);

        let values = actions.values();
        let from_a: Vec<f64> = values.iter().copied().filter(|v| *v < 200.0).collect();
        let from_b: Vec<f64> = values.iter().copied().filter(|v| *v >= 200.0).collect();
        assert_eq!(from_a, vec![100.0, 101.0, 102.0]);
        assert_eq!(from_b, vec![200.0, 201.0]);
    }

    /// Every message is processed exactly once with several workers
    #[test]
    fn test_worker_pool_processes_each_message_once() {
        let body: String = (0..200).map(|i| event("telemetry", &sample(i), i)).collect();
        let server = SseServer::start(vec![Connection::new(body, Duration::from_secs(1))]);
        let actions = Arc::new(CollectingActions::default());

        let dispatcher = builder(
            listener_config("eventSource", sse_arguments(&server.url)),
            3,
            actions.clone(),
        )
        .build()
        .unwrap();
        let running = Running::start(dispatcher);
        assert!(wait_until(TIMEOUT, || actions.values().len() == 200));
        let dispatcher = running.finish();

        let mut values: Vec<u64> = actions.values().into_iter().map(|v| v as u64).collect();
        values.sort_unstable();
        assert_eq!(values, (0..200).collect::<Vec<_>>());
        assert_eq!(dispatcher.queue_len(), 0);
    }

    /// A dropped stream is reopened with the last seen event id
    #[test]
    fn test_reconnect_resumes_from_last_event() {
        let server = SseServer::start(vec![
            Connection::new(
                [event("telemetry", &sample(1), 1), event("telemetry", &sample(2), 2)].concat(),
                Duration::ZERO,
            ),
            Connection::new(event("telemetry", &sample(3), 3), Duration::from_secs(1)),
        ]);
        let actions = Arc::new(CollectingActions::default());

        let dispatcher = builder(
            listener_config("eventSource", sse_arguments(&server.url)),
            1,
            actions.clone(),
        )
        .build()
        .unwrap();
        let running = Running::start(dispatcher);
        assert!(wait_until(TIMEOUT, || actions.values().len() == 3));
        running.finish();

        assert_eq!(actions.values(), vec![1.0, 2.0, 3.0]);
        let requests = server.requests();
        assert!(requests.len() >= 2);
        assert!(!requests[0].contains("last-event-id"));
        assert!(requests[1].contains("last-event-id: 2"));
        assert_eq!(server.max_active(), 1);
    }

    /// The cursor file carries the resume position across runs
    #[test]
    fn test_cursor_file_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let cursor_path = dir.path().join("cursors.json");

        let first = SseServer::start(vec![Connection::new(
            [event("telemetry", &sample(1), 10), event("telemetry", &sample(2), 11)].concat(),
            Duration::from_secs(1),
        )]);
        let actions = Arc::new(CollectingActions::default());
        let dispatcher = builder(
            listener_config("eventSource", sse_arguments(&first.url)),
            1,
            actions.clone(),
        )
        .with_cursor_store(Arc::new(FileCursorStore::open(&cursor_path).unwrap()))
        .build()
        .unwrap();
        let running = Running::start(dispatcher);
        assert!(wait_until(TIMEOUT, || actions.values().len() == 2));
        running.finish();

        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&cursor_path).unwrap()).unwrap();
        assert_eq!(stored["/events/stream"], "11");

        let second = SseServer::start(vec![Connection::new(
            event("telemetry", &sample(3), 12),
            Duration::from_secs(1),
        )]);
        let store = Arc::new(FileCursorStore::open(&cursor_path).unwrap());
        assert_eq!(store.load("/events/stream").as_deref(), Some("11"));

        let actions = Arc::new(CollectingActions::default());
        let dispatcher = builder(
            listener_config("eventSource", sse_arguments(&second.url)),
            1,
            actions.clone(),
        )
        .with_cursor_store(store.clone())
        .build()
        .unwrap();
        let running = Running::start(dispatcher);
        assert!(wait_until(TIMEOUT, || actions.values().len() == 1));
        running.finish();

        assert!(second.requests()[0].contains("last-event-id: 11"));
        assert_eq!(store.load("/events/stream").as_deref(), Some("12"));
    }

    /// Stop returns within the configured bound even while the stream is silent
    #[test]
    fn test_stop_is_bounded() {
        let server = SseServer::start(vec![Connection::new("", Duration::from_secs(30))]);
        let actions = Arc::new(CollectingActions::default());
        let mut arguments = sse_arguments(&server.url);
        arguments["stopTimeoutMs"] = json!(300);

        let dispatcher = builder(listener_config("eventSource", arguments), 1, actions)
            .build()
            .unwrap();
        let running = Running::start(dispatcher);
        let handle = running.dispatcher.handles()[0].clone();
        assert!(wait_until(TIMEOUT, || handle.is_connected()));

        let started = Instant::now();
        running.finish();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!handle.is_connected());
        assert_eq!(handle.state(), StreamConnectionState::Closed);
    }

    /// The file replay sink feeds the same pipeline
    #[test]
    fn test_benchmark_sink_replay() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("samples.txt");
        std::fs::write(&data, format!("{}\n\n{}\n{}\n", sample(7), sample(8), sample(9))).unwrap();

        let actions = Arc::new(CollectingActions::default());
        let arguments = json!({
            "rawDataFileName": data.display().to_string(),
            "publishedSubject": "telemetry",
            "initialDelaySeconds": 0
        });
        let dispatcher = builder(listener_config("benchmark", arguments), 2, actions.clone())
            .build()
            .unwrap();
        let running = Running::start(dispatcher);
        assert!(wait_until(TIMEOUT, || actions.values().len() == 3));
        running.finish();

        let mut values = actions.values();
        values.sort_by(f64::total_cmp);
        assert_eq!(values, vec![7.0, 8.0, 9.0]);
    }
}
