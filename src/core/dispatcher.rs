//! Background dispatcher
//!
//! One dispatcher thread per logger drains the record queue, encodes each
//! batch and pushes it through the transport, retrying failed pushes with
//! backoff. A batch whose retries are exhausted is reported to the failure
//! sink and dropped; the thread then carries on with the next batch.
//!
//! Lifecycle: `Idle`/`Collecting`/`Sending` while running, `Draining` once
//! shutdown is requested (final flush bounded by the shutdown deadline),
//! then `Stopped`.

use super::encoder::Batch;
use super::error::{LoggerError, Result};
use super::metrics::LoggerMetrics;
use super::queue::RecordQueue;
use super::record::Record;
use super::retry::RetryPolicy;
use crate::transport::{Transport, TransportError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DispatcherState {
    /// Between flush cycles
    Idle = 0,
    /// Waiting for the size or time trigger
    Collecting = 1,
    /// A batch is being pushed (including retry backoff)
    Sending = 2,
    /// Final drain after shutdown was requested
    Draining = 3,
    /// Thread finished; terminal
    Stopped = 4,
}

impl DispatcherState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DispatcherState::Idle,
            1 => DispatcherState::Collecting,
            2 => DispatcherState::Sending,
            3 => DispatcherState::Draining,
            _ => DispatcherState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            DispatcherState::Idle | DispatcherState::Collecting | DispatcherState::Sending
        )
    }
}

/// Shared view of the dispatcher state
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(DispatcherState::Idle as u8)))
    }

    pub fn get(&self) -> DispatcherState {
        DispatcherState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: DispatcherState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Messages from the facade to the dispatcher thread
#[derive(Debug)]
pub enum Signal {
    /// Queue depth reached the batch size
    Wake,
    /// Deliver everything queued now, then acknowledge
    Flush(Sender<()>),
    /// Stop accepting work; finish the final drain before `deadline`
    Shutdown { deadline: Instant },
}

/// A batch the dispatcher gave up on
#[derive(Debug)]
pub struct DeliveryFailure {
    /// Number of records lost with the batch
    pub batch_size: usize,
    /// Send attempts made (0 when the batch never reached the transport)
    pub attempts: u32,
    /// The last error seen for the batch
    pub error: LoggerError,
}

/// Callback receiving permanently dropped batches
pub type FailureCallback = Arc<dyn Fn(&DeliveryFailure) + Send + Sync>;

pub(crate) struct DispatcherSettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub shutdown_timeout: Duration,
    pub retry: RetryPolicy,
    pub on_failure: Option<FailureCallback>,
}

pub(crate) struct Dispatcher {
    queue: Arc<RecordQueue>,
    transport: Box<dyn Transport>,
    control: Receiver<Signal>,
    metrics: Arc<LoggerMetrics>,
    state: StateCell,
    settings: DispatcherSettings,
    deadline: Option<Instant>,
    disconnected: bool,
    pending_acks: Vec<Sender<()>>,
}

impl Dispatcher {
    pub(crate) fn new(
        queue: Arc<RecordQueue>,
        transport: Box<dyn Transport>,
        control: Receiver<Signal>,
        metrics: Arc<LoggerMetrics>,
        state: StateCell,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            queue,
            transport,
            control,
            metrics,
            state,
            settings,
            deadline: None,
            disconnected: false,
            pending_acks: Vec::new(),
        }
    }

    /// Start the dispatcher on its own named thread
    pub(crate) fn spawn(self, name: &str) -> Result<thread::JoinHandle<()>> {
        let handle = thread::Builder::new()
            .name(format!("loki-dispatcher-{}", name))
            .spawn(move || self.run())?;
        Ok(handle)
    }

    pub(crate) fn run(mut self) {
        let mut last_flush = Instant::now();

        while self.deadline.is_none() {
            self.poll_signals();
            if self.deadline.is_some() {
                break;
            }
            self.state.set(DispatcherState::Collecting);

            let due = last_flush + self.settings.flush_interval;
            let size_ready = self.queue.len() >= self.settings.batch_size;
            if size_ready || Instant::now() >= due {
                let batch = self.queue.drain(self.settings.batch_size);
                if !batch.is_empty() {
                    self.deliver(batch);
                }
                last_flush = Instant::now();
                self.state.set(DispatcherState::Idle);
            } else {
                self.wait(due.saturating_duration_since(Instant::now()));
            }

            if !self.pending_acks.is_empty() && self.deadline.is_none() {
                self.flush_pending();
                last_flush = Instant::now();
                self.state.set(DispatcherState::Idle);
            }
        }

        self.state.set(DispatcherState::Draining);
        self.drain_remaining();
        for ack in self.pending_acks.drain(..) {
            let _ = ack.send(());
        }
        self.state.set(DispatcherState::Stopped);
        // the transport is released when `self` drops here
    }

    /// Block until a signal arrives or `timeout` passes
    fn wait(&mut self, timeout: Duration) {
        if self.disconnected {
            thread::sleep(timeout);
            return;
        }
        match self.control.recv_timeout(timeout) {
            Ok(signal) => self.handle_signal(signal),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.on_disconnect(),
        }
    }

    /// Take every signal already waiting, without blocking
    ///
    /// A backlog of full batches keeps the run loop away from `wait`, so
    /// shutdown and flush requests are picked up here between deliveries.
    fn poll_signals(&mut self) {
        while !self.disconnected {
            match self.control.try_recv() {
                Ok(signal) => self.handle_signal(signal),
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => self.on_disconnect(),
            }
        }
    }

    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::Wake => self.queue.disarm(),
            Signal::Flush(ack) => self.pending_acks.push(ack),
            Signal::Shutdown { deadline } => {
                self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
            }
        }
    }

    fn on_disconnect(&mut self) {
        self.disconnected = true;
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.settings.shutdown_timeout);
        }
    }

    /// Deliver everything that was queued when the flush was requested
    fn flush_pending(&mut self) {
        let mut remaining = self.queue.len();
        while remaining > 0 && self.deadline.is_none() {
            let batch = self.queue.drain(self.settings.batch_size.min(remaining));
            if batch.is_empty() {
                break;
            }
            remaining -= batch.len();
            self.deliver(batch);
            self.poll_signals();
        }
        if self.deadline.is_none() {
            for ack in self.pending_acks.drain(..) {
                let _ = ack.send(());
            }
        }
    }

    fn drain_remaining(&mut self) {
        loop {
            if self.past_deadline() {
                let abandoned = self.queue.drain(usize::MAX);
                if !abandoned.is_empty() {
                    let pending = abandoned.len();
                    self.report(DeliveryFailure {
                        batch_size: pending,
                        attempts: 0,
                        error: LoggerError::ShutdownTimeout { pending },
                    });
                }
                return;
            }

            let batch = self.queue.drain(self.settings.batch_size);
            if batch.is_empty() {
                return;
            }
            self.deliver(batch);
            self.poll_signals();
        }
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Encode and push one batch, retrying with backoff
    fn deliver(&mut self, records: Vec<Record>) {
        self.state.set(if self.deadline.is_some() {
            DispatcherState::Draining
        } else {
            DispatcherState::Sending
        });

        let count = records.len();
        let payload = match Batch::from_records(&records).and_then(|batch| batch.to_json()) {
            Ok(payload) => payload,
            Err(error) => {
                eprintln!(
                    "[LOKI LOGGER ERROR] Dropping batch of {} records that could not be encoded: {}",
                    count, error
                );
                self.report(DeliveryFailure {
                    batch_size: count,
                    attempts: 0,
                    error,
                });
                return;
            }
        };
        drop(records);

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            self.metrics.record_attempt();

            let error = match self.send_isolated(&payload) {
                Ok(_) => {
                    self.metrics.record_delivered(count);
                    return;
                }
                Err(error) => error,
            };

            if attempts > self.settings.retry.max_retries {
                self.report(DeliveryFailure {
                    batch_size: count,
                    attempts,
                    error: error.into(),
                });
                return;
            }

            let delay = self.settings.retry.delay_for_retry(attempts);
            if !self.pause(delay) {
                self.report(DeliveryFailure {
                    batch_size: count,
                    attempts,
                    error: error.into(),
                });
                return;
            }
            self.metrics.record_retry();
        }
    }

    /// Call the transport, turning a panic into an ordinary send failure
    fn send_isolated(&mut self, payload: &[u8]) -> std::result::Result<u16, TransportError> {
        let transport = &mut self.transport;
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| transport.send(payload))) {
            Ok(result) => result,
            Err(panic_info) => {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                eprintln!(
                    "[LOKI LOGGER CRITICAL] Transport '{}' panicked: {}. Dispatcher continues.",
                    self.transport.name(),
                    panic_msg
                );
                Err(TransportError::Panicked(panic_msg))
            }
        }
    }

    /// Sleep for a backoff delay while still taking signals
    ///
    /// Returns `false` when the delay would run past the shutdown deadline.
    fn pause(&mut self, delay: Duration) -> bool {
        let wake_at = Instant::now() + delay;
        loop {
            if self.deadline.is_some_and(|deadline| wake_at > deadline) {
                return false;
            }
            let now = Instant::now();
            if now >= wake_at {
                return true;
            }
            self.wait(wake_at - now);
        }
    }

    fn report(&self, failure: DeliveryFailure) {
        self.metrics.record_batch_dropped(failure.batch_size);
        match &self.settings.on_failure {
            Some(callback) => callback(&failure),
            None => eprintln!(
                "[LOKI LOGGER ERROR] Dropped batch of {} records after {} attempts: {}",
                failure.batch_size, failure.attempts, failure.error
            ),
        }
    }
}
