//! Loki logger facade

use super::{
    caller::{CallerResolver, FileLineResolver},
    config::{Credentials, LoggerConfig, LEVEL_LABEL},
    dispatcher::{
        Dispatcher, DispatcherSettings, DispatcherState, FailureCallback, Signal,
        StateCell,
    },
    error::{LoggerError, Result},
    labels::LabelSet,
    log_level::LogLevel,
    metrics::LoggerMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy, QueueCapacity},
    queue::{Admission, RecordQueue},
    record::Record,
    retry::RetryPolicy,
    timestamp::{MonotonicClock, TimestampFormat},
};
use crate::console::ConsoleEcho;
use chrono::{DateTime, Utc};
use crate::transport::Transport;
use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Mutex, RwLock};
use std::panic::Location;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Log shipper pushing batches of records to Loki
///
/// Level methods build a [`Record`] on the calling thread and queue it; they
/// never wait on the network. A dedicated dispatcher thread, started by
/// [`LokiLoggerBuilder::build`], pushes the queued records in batches.
/// Dropping the logger (or calling [`shutdown`](Self::shutdown)) performs a
/// final, time-bounded drain.
///
/// `LokiLogger` is `Send + Sync`; share it between threads with an `Arc`.
pub struct LokiLogger {
    name: String,
    base_labels: LabelSet,
    min_level: RwLock<LogLevel>,
    queue: Arc<RecordQueue>,
    control: Sender<Signal>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    state: StateCell,
    metrics: Arc<LoggerMetrics>,
    clock: MonotonicClock,
    caller: Box<dyn CallerResolver>,
    console: Option<ConsoleEcho>,
    batch_size: usize,
    shutdown_timeout: Duration,
    on_overflow: Option<OverflowCallback>,
}

impl LokiLogger {
    /// Create a builder for a logger named `name`
    ///
    /// # Example
    /// ```no_run
    /// use loki_logger_system::prelude::*;
    /// use std::time::Duration;
    ///
    /// let logger = LokiLogger::builder("billing")
    ///     .endpoint("http://localhost:3100")
    ///     .basic_auth("user", "secret")
    ///     .label("env", "production")
    ///     .batch_size(50)
    ///     .flush_interval(Duration::from_secs(2))
    ///     .build()
    ///     .expect("valid configuration");
    ///
    /// logger.info("invoice created").ok();
    /// ```
    #[must_use]
    pub fn builder(name: impl Into<String>) -> LokiLoggerBuilder {
        LokiLoggerBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Labels attached to every record (before the per-record `level`)
    pub fn base_labels(&self) -> &LabelSet {
        &self.base_labels
    }

    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.write() = level;
    }

    pub fn min_level(&self) -> LogLevel {
        *self.min_level.read()
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl Into<String>) -> Result<()> {
        self.log_with_labels(level, message, std::iter::empty::<(&str, &str)>())
    }

    /// Log with extra labels that add to or override the base labels
    ///
    /// Only [`LoggerError::Shutdown`] is ever returned; delivery problems are
    /// handled on the dispatcher thread.
    #[track_caller]
    pub fn log_with_labels<I, K, V>(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        labels: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        if level < *self.min_level.read() {
            return Ok(());
        }
        if self.queue.is_closed() {
            return Err(LoggerError::Shutdown);
        }

        let caller = self.caller.identify(Location::caller());

        let mut record_labels = self.base_labels.clone();
        record_labels.insert(LEVEL_LABEL, level.label_value());
        record_labels.extend(labels);

        let record = Record::new(DateTime::<Utc>::default(), level, message, record_labels)
            .with_caller(caller);

        // the echo copy is stamped with the timestamp the queue assigned
        let echo = self.console.as_ref().map(|console| (console, record.clone()));
        let timestamp = self.enqueue(record)?;
        if let Some((console, mut copy)) = echo {
            copy.set_timestamp(timestamp);
            console.echo(&self.name, &copy);
        }
        Ok(())
    }

    /// Queue a record, applying the overflow policy and the size trigger
    fn enqueue(&self, record: Record) -> Result<DateTime<Utc>> {
        self.metrics.record_offered();
        let (admission, timestamp) = self.queue.push_stamped(record, &self.clock)?;

        match admission {
            Admission::Queued { depth } | Admission::Evicted { depth } => {
                self.metrics.record_enqueued();
                if admission.overflowed() {
                    self.alert_overflow();
                }
                if depth >= self.batch_size && self.queue.arm_wake() {
                    let _ = self.control.send(Signal::Wake);
                }
            }
            Admission::Rejected => self.alert_overflow(),
        }
        Ok(timestamp)
    }

    /// Count an overflow drop, alerting on the first and every 1000th
    fn alert_overflow(&self) {
        let dropped_count = self.metrics.record_overflow();

        let should_alert = dropped_count == 0 || (dropped_count + 1) % 1000 == 0;
        if should_alert {
            eprintln!(
                "[LOKI LOGGER WARNING] Queue full, {} records dropped. \
                 Consider a larger queue capacity or check the Loki endpoint.",
                dropped_count + 1
            );

            if let Some(ref callback) = self.on_overflow {
                callback(dropped_count + 1);
            }
        }
    }

    #[inline]
    #[track_caller]
    pub fn trace(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogLevel::Trace, message)
    }

    #[inline]
    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogLevel::Debug, message)
    }

    #[inline]
    #[track_caller]
    pub fn info(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogLevel::Info, message)
    }

    #[inline]
    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogLevel::Warn, message)
    }

    #[inline]
    #[track_caller]
    pub fn error(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogLevel::Error, message)
    }

    #[inline]
    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) -> Result<()> {
        self.log(LogLevel::Critical, message)
    }

    /// Number of records waiting for the dispatcher
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn dispatcher_state(&self) -> DispatcherState {
        self.state.get()
    }

    /// Get the logger metrics for detailed observability
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Ask the dispatcher to deliver everything queued right now
    ///
    /// Returns `true` once the dispatcher has worked through those records
    /// (delivered or reported as dropped), `false` if that did not happen
    /// within `timeout` or the dispatcher is no longer running.
    pub fn flush(&self, timeout: Duration) -> bool {
        if !self.state.get().is_running() {
            return false;
        }
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if self.control.send(Signal::Flush(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Gracefully shutdown the logger with a custom timeout
    ///
    /// New records are refused from this point on. The dispatcher pushes what
    /// is still queued, giving up on whatever is left once `timeout` has
    /// passed, and then stops. Calling this again is a no-op returning `true`.
    ///
    /// **Note**: When the logger is dropped without calling `shutdown()`
    /// explicitly, it uses the configured shutdown timeout
    /// ([`DEFAULT_SHUTDOWN_TIMEOUT`](super::config::DEFAULT_SHUTDOWN_TIMEOUT)
    /// unless changed).
    ///
    /// # Returns
    ///
    /// `true` if the dispatcher finished within `timeout`, `false` otherwise
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let Some(handle) = self.worker.lock().take() else {
            return true;
        };

        self.queue.close();
        let start = Instant::now();
        let _ = self.control.send(Signal::Shutdown {
            deadline: start + timeout,
        });

        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    eprintln!(
                        "[LOKI LOGGER ERROR] Dispatcher thread panicked during shutdown: {:?}",
                        e
                    );
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                eprintln!(
                    "[LOKI LOGGER WARNING] Dispatcher thread did not finish within {:?}. \
                     Some logs may be lost.",
                    timeout
                );
                return false;
            }

            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.queue.is_closed()
    }

    #[cfg(test)]
    pub(crate) fn take_queued(&self) -> Vec<Record> {
        self.queue.drain(usize::MAX)
    }
}

impl Drop for LokiLogger {
    fn drop(&mut self) {
        self.shutdown(self.shutdown_timeout);

        let lost = self.metrics.total_lost();
        if lost > 0 {
            eprintln!(
                "[LOKI LOGGER WARNING] Logger '{}' shutting down with {} lost records (loss rate: {:.2}%)",
                self.name,
                lost,
                self.metrics.loss_rate()
            );
        }
    }
}

/// Builder for constructing a [`LokiLogger`] with a fluent API
///
/// # Example
/// ```
/// use loki_logger_system::prelude::*;
/// use loki_logger_system::transport::{StatusCode, Transport, TransportError};
/// use std::sync::Arc;
///
/// struct Discard;
///
/// impl Transport for Discard {
///     fn send(&mut self, _payload: &[u8]) -> std::result::Result<StatusCode, TransportError> {
///         Ok(204)
///     }
///     fn name(&self) -> &str {
///         "discard"
///     }
/// }
///
/// let logger = LokiLogger::builder("worker")
///     .transport(Discard)
///     .min_level(LogLevel::Debug)
///     .queue_capacity(QueueCapacity::Bounded(1_000))
///     .overflow_policy(OverflowPolicy::DropOldest)
///     .on_delivery_failure(Arc::new(|failure: &DeliveryFailure| {
///         eprintln!("lost {} records: {}", failure.batch_size, failure.error);
///     }))
///     .console_echo(false)
///     .build()
///     .unwrap();
///
/// logger.debug("ready").unwrap();
/// ```
pub struct LokiLoggerBuilder {
    config: LoggerConfig,
    transport: Option<Box<dyn Transport>>,
    caller: Box<dyn CallerResolver>,
    on_failure: Option<FailureCallback>,
    on_overflow: Option<OverflowCallback>,
}

impl LokiLoggerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_config(LoggerConfig {
            name: name.into(),
            ..LoggerConfig::default()
        })
    }

    /// Start from a prepared configuration
    pub fn from_config(config: LoggerConfig) -> Self {
        Self {
            config,
            transport: None,
            caller: Box::new(FileLineResolver),
            on_failure: None,
            on_overflow: None,
        }
    }

    /// Loki server URL, e.g. `http://localhost:3100`
    #[must_use = "builder methods return a new value"]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Tenant sent as `X-Scope-OrgID`
    #[must_use = "builder methods return a new value"]
    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.config.tenant = Some(tenant.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn label(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.config.labels.insert(key, value);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.config.labels.extend(labels);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.config.min_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval = interval;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    /// Delay before the first retry and the cap for later ones
    #[must_use = "builder methods return a new value"]
    pub fn backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.config.retry.base_delay = base;
        self.config.retry.max_delay = cap;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn backoff_jitter(mut self, jitter: f64) -> Self {
        self.config.retry = self.config.retry.with_jitter(jitter);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn queue_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the overflow policy for a bounded queue
    ///
    /// Default is `DropOldest`.
    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Mirror every record to stdout/stderr (on by default)
    #[must_use = "builder methods return a new value"]
    pub fn console_echo(mut self, enabled: bool) -> Self {
        self.config.console_echo = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn console_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.config.console_timestamp_format = format;
        self
    }

    /// Replace the default file:line caller tag
    #[must_use = "builder methods return a new value"]
    pub fn caller_resolver<R: CallerResolver + 'static>(mut self, resolver: R) -> Self {
        self.caller = Box::new(resolver);
        self
    }

    /// Use a custom transport instead of HTTP to `endpoint`
    #[must_use = "builder methods return a new value"]
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Set a callback for permanently dropped batches
    ///
    /// Without one, drops are reported on stderr.
    #[must_use = "builder methods return a new value"]
    pub fn on_delivery_failure(mut self, callback: FailureCallback) -> Self {
        self.on_failure = Some(callback);
        self
    }

    /// Set a callback for overflow notifications
    ///
    /// The parameter is the total count of records dropped by the overflow policy.
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Validate the configuration, create the transport and start the dispatcher
    pub fn build(self) -> Result<LokiLogger> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.config)?,
        };

        let config = self.config;
        let queue = Arc::new(RecordQueue::new(
            config.queue_capacity,
            config.overflow_policy,
        ));
        let metrics = Arc::new(LoggerMetrics::new());
        let state = StateCell::new();
        let (control_tx, control_rx) = unbounded();

        let dispatcher = Dispatcher::new(
            Arc::clone(&queue),
            transport,
            control_rx,
            Arc::clone(&metrics),
            state.clone(),
            DispatcherSettings {
                batch_size: config.batch_size,
                flush_interval: config.flush_interval,
                shutdown_timeout: config.shutdown_timeout,
                retry: config.retry.clone(),
                on_failure: self.on_failure,
            },
        );
        let handle = dispatcher.spawn(&config.name)?;

        let console = config.console_echo.then(|| {
            ConsoleEcho::new().with_timestamp_format(config.console_timestamp_format.clone())
        });

        Ok(LokiLogger {
            base_labels: config.base_labels(),
            name: config.name,
            min_level: RwLock::new(config.min_level),
            queue,
            control: control_tx,
            worker: Mutex::new(Some(handle)),
            state,
            metrics,
            clock: MonotonicClock::new(),
            caller: self.caller,
            console,
            batch_size: config.batch_size,
            shutdown_timeout: config.shutdown_timeout,
            on_overflow: self.on_overflow,
        })
    }
}

#[cfg(feature = "http")]
fn default_transport(config: &LoggerConfig) -> Result<Box<dyn Transport>> {
    use crate::transport::HttpTransport;

    let endpoint = config
        .endpoint
        .as_deref()
        .ok_or_else(|| LoggerError::config("endpoint", "required when no transport is supplied"))?;

    let mut transport = HttpTransport::new(endpoint, config.request_timeout)
        .map_err(|e| LoggerError::config("endpoint", e.to_string()))?;
    if let Some(ref credentials) = config.credentials {
        transport = transport.with_basic_auth(&credentials.username, &credentials.password);
    }
    if let Some(ref tenant) = config.tenant {
        transport = transport.with_tenant(tenant.clone());
    }
    Ok(Box::new(transport))
}

#[cfg(not(feature = "http"))]
fn default_transport(_config: &LoggerConfig) -> Result<Box<dyn Transport>> {
    Err(LoggerError::config(
        "transport",
        "the `http` feature is disabled; supply a transport explicitly",
    ))
}
