//! Integration tests for the Loki logger
//!
//! These tests verify:
//! - Size and time flush triggers
//! - Retry, permanent failure and recovery
//! - Shutdown drain
//! - Concurrent producers
//! - Stream grouping and label merging
//! - The HTTP transport against a loopback server

use loki_logger_system::prelude::*;
use loki_logger_system::transport::StatusCode;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Outcome = std::result::Result<StatusCode, TransportError>;

/// Records every payload and answers from a script, then with 204
#[derive(Clone, Default)]
struct Recorder {
    sent: Arc<Mutex<Vec<Value>>>,
    script: Arc<Mutex<Vec<Outcome>>>,
}

impl Recorder {
    fn scripted(outcomes: Vec<Outcome>) -> Self {
        Self {
            sent: Arc::default(),
            script: Arc::new(Mutex::new(outcomes)),
        }
    }

    fn attempts(&self) -> usize {
        self.sent.lock().len()
    }

    fn payloads(&self) -> Vec<Value> {
        self.sent.lock().clone()
    }
}

impl Transport for Recorder {
    fn send(&mut self, payload: &[u8]) -> Outcome {
        let body: Value = serde_json::from_slice(payload).expect("payload is JSON");
        self.sent.lock().push(body);
        let mut script = self.script.lock();
        if script.is_empty() {
            Ok(204)
        } else {
            script.remove(0)
        }
    }

    fn name(&self) -> &str {
        "recorder"
    }
}

fn network_down() -> Outcome {
    Err(TransportError::Network("connection refused".to_string()))
}

fn quiet_builder(name: &str, transport: Recorder) -> LokiLoggerBuilder {
    LokiLogger::builder(name)
        .transport(transport)
        .console_echo(false)
        .backoff(Duration::from_millis(1), Duration::from_millis(5))
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// `(stream labels, [(timestamp, line)])` for every stream of a payload
fn streams(payload: &Value) -> Vec<(Value, Vec<(String, String)>)> {
    payload["streams"]
        .as_array()
        .expect("streams array")
        .iter()
        .map(|stream| {
            let values = stream["values"]
                .as_array()
                .expect("values array")
                .iter()
                .map(|pair| {
                    (
                        pair[0].as_str().unwrap().to_string(),
                        pair[1].as_str().unwrap().to_string(),
                    )
                })
                .collect();
            (stream["stream"].clone(), values)
        })
        .collect()
}

fn lines(payload: &Value) -> Vec<String> {
    streams(payload)
        .into_iter()
        .flat_map(|(_, values)| values.into_iter().map(|(_, line)| line))
        .collect()
}

#[test]
fn test_flush_by_size_sends_one_batch() {
    let transport = Recorder::default();
    let logger = quiet_builder("size", transport.clone())
        .batch_size(5)
        .flush_interval(Duration::from_secs(60))
        .build()
        .unwrap();

    for i in 0..5 {
        logger.info(format!("record {}", i)).unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || transport.attempts() == 1));
    thread::sleep(Duration::from_millis(50));
    assert_eq!(transport.attempts(), 1);

    let payloads = transport.payloads();
    assert_eq!(lines(&payloads[0]).len(), 5);
    assert_eq!(logger.metrics().records_delivered(), 5);
}

#[test]
fn test_flush_by_time_sends_partial_batch() {
    let transport = Recorder::default();
    let logger = quiet_builder("time", transport.clone())
        .batch_size(100)
        .flush_interval(Duration::from_millis(100))
        .build()
        .unwrap();

    logger.warn("lonely record").unwrap();

    assert!(wait_until(Duration::from_secs(5), || transport.attempts() == 1));
    let line = &lines(&transport.payloads()[0])[0];
    assert!(line.ends_with("lonely record"), "{}", line);
}

#[test]
fn test_retry_succeeds_on_third_attempt() {
    let transport = Recorder::scripted(vec![
        network_down(),
        Err(TransportError::Status {
            code: 503,
            body: "ingester unavailable".to_string(),
        }),
    ]);
    let logger = quiet_builder("retry", transport.clone())
        .batch_size(1)
        .max_retries(3)
        .build()
        .unwrap();

    logger.error("must arrive").unwrap();

    assert!(wait_until(Duration::from_secs(5), || logger
        .metrics()
        .records_delivered()
        == 1));
    assert_eq!(transport.attempts(), 3);
    assert_eq!(logger.metrics().send_attempts(), 3);
    assert_eq!(logger.metrics().retries(), 2);
    assert_eq!(logger.metrics().batches_dropped(), 0);

    // retries resend the identical payload
    let payloads = transport.payloads();
    assert!(payloads.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_permanent_failure_drops_batch_and_continues() {
    let transport = Recorder::scripted(vec![network_down(), network_down(), network_down()]);
    let failures = Arc::new(Mutex::new(Vec::new()));
    let failures_clone = Arc::clone(&failures);

    let logger = quiet_builder("give-up", transport.clone())
        .batch_size(1)
        .max_retries(2)
        .on_delivery_failure(Arc::new(move |failure: &DeliveryFailure| {
            failures_clone
                .lock()
                .push((failure.batch_size, failure.attempts));
        }))
        .build()
        .unwrap();

    logger.info("lost").unwrap();
    assert!(wait_until(Duration::from_secs(5), || logger
        .metrics()
        .batches_dropped()
        == 1));
    assert_eq!(transport.attempts(), 3);
    assert_eq!(*failures.lock(), vec![(1, 3)]);

    logger.info("delivered").unwrap();
    assert!(wait_until(Duration::from_secs(5), || logger
        .metrics()
        .records_delivered()
        == 1));
    assert_eq!(transport.attempts(), 4);
    assert!(logger.dispatcher_state().is_running());
    assert_eq!(logger.metrics().total_lost(), 1);
}

#[test]
fn test_shutdown_drains_pending_records() {
    let transport = Recorder::default();
    let logger = quiet_builder("drain", transport.clone())
        .batch_size(100)
        .flush_interval(Duration::from_secs(60))
        .build()
        .unwrap();

    for i in 0..5 {
        logger.info(format!("pending {}", i)).unwrap();
    }
    assert!(logger.shutdown(Duration::from_secs(5)));

    assert_eq!(logger.dispatcher_state(), DispatcherState::Stopped);
    let payloads = transport.payloads();
    assert_eq!(payloads.len(), 1);
    let sent = lines(&payloads[0]);
    assert_eq!(sent.len(), 5);
    assert!(sent[4].ends_with("pending 4"));
}

#[test]
fn test_shutdown_gives_up_at_deadline() {
    let transport = Recorder::scripted((0..1000).map(|_| network_down()).collect());
    let failures = Arc::new(Mutex::new(0usize));
    let failures_clone = Arc::clone(&failures);

    let logger = quiet_builder("deadline", transport)
        .batch_size(100)
        .flush_interval(Duration::from_secs(60))
        .max_retries(1000)
        .backoff(Duration::from_millis(50), Duration::from_millis(50))
        .on_delivery_failure(Arc::new(move |failure: &DeliveryFailure| {
            *failures_clone.lock() += failure.batch_size;
        }))
        .build()
        .unwrap();

    for i in 0..3 {
        logger.info(format!("doomed {}", i)).unwrap();
    }

    let start = Instant::now();
    logger.shutdown(Duration::from_millis(300));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(wait_until(Duration::from_secs(2), || *failures.lock() == 3));
}

#[test]
fn test_enqueue_after_shutdown_is_rejected() {
    let logger = quiet_builder("closed", Recorder::default()).build().unwrap();
    assert!(logger.shutdown(Duration::from_secs(2)));

    assert!(matches!(logger.info("too late"), Err(LoggerError::Shutdown)));
    assert!(matches!(
        logger.log_with_labels(LogLevel::Error, "too late", [("k", "v")]),
        Err(LoggerError::Shutdown)
    ));
    assert_eq!(logger.pending(), 0);
}

#[test]
fn test_concurrent_producers_lose_nothing() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 250;

    let transport = Recorder::default();
    let logger = Arc::new(
        quiet_builder("concurrent", transport.clone())
            .batch_size(50)
            .flush_interval(Duration::from_millis(20))
            .queue_capacity(QueueCapacity::Unbounded)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    logger.info(format!("t{}-{}", t, i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(logger.shutdown(Duration::from_secs(10)));

    let metrics = logger.metrics();
    assert_eq!(
        metrics.records_delivered() + metrics.records_dropped(),
        (THREADS * PER_THREAD) as u64
    );

    let mut seen = HashSet::new();
    let mut last_per_thread = vec![None::<usize>; THREADS];
    for payload in transport.payloads() {
        for line in lines(&payload) {
            let tag = line.rsplit(' ').next().unwrap().to_string();
            let (t, i) = tag[1..].split_once('-').unwrap();
            let (t, i): (usize, usize) = (t.parse().unwrap(), i.parse().unwrap());
            assert!(last_per_thread[t].map_or(true, |last| last < i));
            last_per_thread[t] = Some(i);
            assert!(seen.insert(tag), "duplicate record");
        }
    }
    assert_eq!(seen.len(), THREADS * PER_THREAD);
}

#[test]
fn test_flush_delivers_everything_queued() {
    let transport = Recorder::default();
    let logger = quiet_builder("flush", transport.clone())
        .batch_size(4)
        .flush_interval(Duration::from_secs(60))
        .queue_capacity(QueueCapacity::Bounded(100))
        .build()
        .unwrap();

    for i in 0..3 {
        logger.info(format!("queued {}", i)).unwrap();
    }
    assert!(logger.flush(Duration::from_secs(5)));
    assert_eq!(logger.pending(), 0);

    let delivered: usize = transport.payloads().iter().map(|p| lines(p).len()).sum();
    assert_eq!(delivered, 3);
}

#[test]
fn test_labels_group_streams_and_merge_overrides() {
    let transport = Recorder::default();
    let logger = quiet_builder("labels", transport.clone())
        .label("env", "production")
        .batch_size(100)
        .flush_interval(Duration::from_secs(60))
        .build()
        .unwrap();

    logger.info("plain one").unwrap();
    logger
        .log_with_labels(LogLevel::Info, "override", [("env", "staging"), ("route", "/users")])
        .unwrap();
    logger.info("plain two").unwrap();
    assert!(logger.flush(Duration::from_secs(5)));

    let payloads = transport.payloads();
    assert_eq!(payloads.len(), 1);
    let streams = streams(&payloads[0]);
    assert_eq!(streams.len(), 2);

    let (first_labels, first_values) = &streams[0];
    assert_eq!(first_labels["job"], "labels");
    assert_eq!(first_labels["env"], "production");
    assert_eq!(first_labels["level"], "info");
    assert_eq!(first_values.len(), 2);
    assert!(first_values[0].1.ends_with("plain one"));
    assert!(first_values[1].1.ends_with("plain two"));

    let (second_labels, second_values) = &streams[1];
    assert_eq!(second_labels["env"], "staging");
    assert_eq!(second_labels["route"], "/users");
    assert_eq!(second_labels["job"], "labels");
    assert_eq!(second_values.len(), 1);
}

#[test]
fn test_lines_carry_caller_and_increasing_timestamps() {
    let transport = Recorder::default();
    let logger = quiet_builder("order", transport.clone())
        .batch_size(100)
        .flush_interval(Duration::from_secs(60))
        .build()
        .unwrap();

    for i in 0..20 {
        logger.info(format!("step {}", i)).unwrap();
    }
    assert!(logger.flush(Duration::from_secs(5)));

    let payloads = transport.payloads();
    let (_, values) = &streams(&payloads[0])[0];
    let stamps: Vec<i64> = values.iter().map(|(ts, _)| ts.parse().unwrap()).collect();
    assert!(stamps.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(values[0].1.starts_with("[integration_tests.rs:"), "{}", values[0].1);
}

#[test]
fn test_level_filter_and_custom_caller() {
    let transport = Recorder::default();
    let logger = quiet_builder("filtered", transport.clone())
        .min_level(LogLevel::Warn)
        .caller_resolver(|_: &std::panic::Location<'static>| Some("worker".to_string()))
        .batch_size(100)
        .flush_interval(Duration::from_secs(60))
        .build()
        .unwrap();

    logger.info("ignored").unwrap();
    logger.critical("kept").unwrap();
    assert!(logger.flush(Duration::from_secs(5)));

    let payloads = transport.payloads();
    assert_eq!(lines(&payloads[0]), vec!["[worker] kept".to_string()]);
    assert_eq!(streams(&payloads[0])[0].0["level"], "critical");
}

#[test]
fn test_concurrent_producers_push_non_decreasing_timestamps() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 2000;

    let transport = Recorder::default();
    let logger = Arc::new(
        quiet_builder("stamps", transport.clone())
            .batch_size(100_000)
            .flush_interval(Duration::from_secs(60))
            .queue_capacity(QueueCapacity::Unbounded)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    logger.info(format!("t{}-{}", t, i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(logger.shutdown(Duration::from_secs(10)));

    let mut stamps = Vec::new();
    for payload in transport.payloads() {
        for (labels, values) in streams(&payload) {
            assert_eq!(labels["level"], "info");
            stamps.extend(values.iter().map(|(ts, _)| ts.parse::<i64>().unwrap()));
        }
    }
    assert_eq!(stamps.len(), THREADS * PER_THREAD);
    let inversions = stamps.windows(2).filter(|pair| pair[0] >= pair[1]).count();
    assert_eq!(inversions, 0);
}

/// Takes a fixed time per push and always succeeds
struct SlowTransport {
    delay: Duration,
    sends: Arc<Mutex<usize>>,
}

impl Transport for SlowTransport {
    fn send(&mut self, _payload: &[u8]) -> Outcome {
        thread::sleep(self.delay);
        *self.sends.lock() += 1;
        Ok(204)
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[test]
fn test_shutdown_deadline_holds_with_backlog() {
    const RECORDS: usize = 300;

    let sends = Arc::new(Mutex::new(0usize));
    let abandoned = Arc::new(Mutex::new(0usize));
    let abandoned_clone = Arc::clone(&abandoned);

    let logger = LokiLogger::builder("backlog")
        .transport(SlowTransport {
            delay: Duration::from_millis(20),
            sends: Arc::clone(&sends),
        })
        .console_echo(false)
        .batch_size(1)
        .flush_interval(Duration::from_secs(60))
        .queue_capacity(QueueCapacity::Unbounded)
        .on_delivery_failure(Arc::new(move |failure: &DeliveryFailure| {
            if matches!(failure.error, LoggerError::ShutdownTimeout { .. }) {
                *abandoned_clone.lock() += failure.batch_size;
            }
        }))
        .build()
        .unwrap();

    for i in 0..RECORDS {
        logger.info(format!("backlog {}", i)).unwrap();
    }

    let start = Instant::now();
    logger.shutdown(Duration::from_millis(200));
    assert!(wait_until(Duration::from_secs(2), || logger
        .dispatcher_state()
        == DispatcherState::Stopped));
    assert!(start.elapsed() < Duration::from_secs(1), "{:?}", start.elapsed());

    let delivered = *sends.lock();
    let abandoned = *abandoned.lock();
    assert!(abandoned > 0);
    assert_eq!(delivered + abandoned, RECORDS);
    assert_eq!(logger.metrics().records_dropped(), abandoned as u64);
    assert_eq!(logger.pending(), 0);
}

#[cfg(feature = "http")]
mod http {
    use super::*;
    use loki_logger_system::transport::HttpTransport;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;

    #[derive(Debug)]
    struct Captured {
        request_line: String,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    }

    impl Captured {
        fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        }
    }

    /// Serve one canned response per connection, in order
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, thread::JoinHandle<Vec<Captured>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut captured = Vec::new();
            for (status, body) in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);

                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut headers = Vec::new();
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    let (key, value) = line.split_once(':').unwrap();
                    headers.push((key.trim().to_string(), value.trim().to_string()));
                }
                let length: usize = headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
                    .map(|(_, value)| value.parse().unwrap())
                    .unwrap_or(0);
                let mut request_body = vec![0u8; length];
                reader.read_exact(&mut request_body).unwrap();

                let mut stream = reader.into_inner();
                write!(
                    stream,
                    "HTTP/1.1 {} Canned\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                )
                .unwrap();
                stream.flush().unwrap();

                captured.push(Captured {
                    request_line: request_line.trim_end().to_string(),
                    headers,
                    body: request_body,
                });
            }
            captured
        });

        (endpoint, handle)
    }

    #[test]
    fn test_http_transport_reports_status_and_body() {
        let (endpoint, server) = serve(vec![(400, "entry out of order"), (204, "")]);
        let mut transport = HttpTransport::new(&endpoint, Duration::from_secs(5)).unwrap();

        let error = transport.send(br#"{"streams":[]}"#).unwrap_err();
        assert_eq!(
            error,
            TransportError::Status {
                code: 400,
                body: "entry out of order".to_string()
            }
        );
        assert_eq!(transport.send(br#"{"streams":[]}"#), Ok(204));

        let captured = server.join().unwrap();
        assert_eq!(captured[0].request_line, "POST /loki/api/v1/push HTTP/1.1");
        assert_eq!(captured[1].body, br#"{"streams":[]}"#.to_vec());
    }

    #[test]
    fn test_http_transport_network_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let mut transport = HttpTransport::new(&endpoint, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            transport.send(b"{}"),
            Err(TransportError::Network(_))
        ));
    }

    #[test]
    fn test_logger_pushes_over_http_with_auth_and_tenant() {
        let (endpoint, server) = serve(vec![(500, "try again"), (204, "")]);
        let logger = LokiLogger::builder("http-e2e")
            .endpoint(endpoint)
            .basic_auth("username", "password")
            .tenant("team-a")
            .console_echo(false)
            .batch_size(100)
            .flush_interval(Duration::from_secs(60))
            .max_retries(2)
            .backoff(Duration::from_millis(1), Duration::from_millis(5))
            .build()
            .unwrap();

        logger.info("over the wire").unwrap();
        assert!(logger.shutdown(Duration::from_secs(5)));
        assert_eq!(logger.metrics().records_delivered(), 1);
        assert_eq!(logger.metrics().send_attempts(), 2);

        let captured = server.join().unwrap();
        assert_eq!(captured.len(), 2);
        for request in &captured {
            assert_eq!(request.request_line, "POST /loki/api/v1/push HTTP/1.1");
            assert_eq!(
                request.header("authorization"),
                Some("Basic dXNlcm5hbWU6cGFzc3dvcmQ=")
            );
            assert_eq!(request.header("x-scope-orgid"), Some("team-a"));
            assert!(request
                .header("content-type")
                .is_some_and(|value| value.starts_with("application/json")));
        }

        let body: Value = serde_json::from_slice(&captured[1].body).unwrap();
        assert_eq!(body["streams"][0]["stream"]["job"], "http-e2e");
        assert!(body["streams"][0]["values"][0][1]
            .as_str()
            .unwrap()
            .ends_with("over the wire"));
    }
}
