//! Logger metrics for observability
//!
//! Counters shared between the producer-facing facade and the dispatcher
//! thread, so an application can see how much of its logging actually
//! reached Loki.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use loki_logger_system::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_enqueued();
/// metrics.record_delivered(1);
///
/// assert_eq!(metrics.records_enqueued(), 1);
/// assert_eq!(metrics.records_delivered(), 1);
/// assert_eq!(metrics.batches_delivered(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Log calls that reached the queue, whether accepted or not
    records_offered: AtomicU64,

    /// Records accepted into the queue
    records_enqueued: AtomicU64,

    /// Records lost to queue overflow (evicted or rejected)
    overflow_dropped: AtomicU64,

    /// Batches acknowledged by the endpoint
    batches_delivered: AtomicU64,

    /// Records inside acknowledged batches
    records_delivered: AtomicU64,

    /// Batches given up on after retries, encoding failures or shutdown timeout
    batches_dropped: AtomicU64,

    /// Records inside given-up batches
    records_dropped: AtomicU64,

    /// Every call into the transport
    send_attempts: AtomicU64,

    /// Attempts beyond the first for a batch
    retries: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            records_offered: AtomicU64::new(0),
            records_enqueued: AtomicU64::new(0),
            overflow_dropped: AtomicU64::new(0),
            batches_delivered: AtomicU64::new(0),
            records_delivered: AtomicU64::new(0),
            batches_dropped: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            send_attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn records_offered(&self) -> u64 {
        self.records_offered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn records_enqueued(&self) -> u64 {
        self.records_enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn overflow_dropped(&self) -> u64 {
        self.overflow_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn batches_delivered(&self) -> u64 {
        self.batches_delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn records_delivered(&self) -> u64 {
        self.records_delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn batches_dropped(&self) -> u64 {
        self.batches_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn send_attempts(&self) -> u64 {
        self.send_attempts.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_offered(&self) {
        self.records_offered.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the previous value
    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.records_enqueued.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the previous value
    #[inline]
    pub fn record_overflow(&self) -> u64 {
        self.overflow_dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self, records: usize) {
        self.batches_delivered.fetch_add(1, Ordering::Relaxed);
        self.records_delivered
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_batch_dropped(&self, records: usize) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.records_dropped.fetch_add(records as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_attempt(&self) {
        self.send_attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records lost for any reason, overflow included
    pub fn total_lost(&self) -> u64 {
        self.overflow_dropped() + self.records_dropped()
    }

    /// Share of offered records that were lost, as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been offered.
    pub fn loss_rate(&self) -> f64 {
        let lost = self.total_lost() as f64;
        let total = self.records_offered() as f64;
        if total == 0.0 {
            0.0
        } else {
            (lost / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        for counter in [
            &self.records_offered,
            &self.records_enqueued,
            &self.overflow_dropped,
            &self.batches_delivered,
            &self.records_delivered,
            &self.batches_dropped,
            &self.records_dropped,
            &self.send_attempts,
            &self.retries,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            records_offered: AtomicU64::new(self.records_offered()),
            records_enqueued: AtomicU64::new(self.records_enqueued()),
            overflow_dropped: AtomicU64::new(self.overflow_dropped()),
            batches_delivered: AtomicU64::new(self.batches_delivered()),
            records_delivered: AtomicU64::new(self.records_delivered()),
            batches_dropped: AtomicU64::new(self.batches_dropped()),
            records_dropped: AtomicU64::new(self.records_dropped()),
            send_attempts: AtomicU64::new(self.send_attempts()),
            retries: AtomicU64::new(self.retries()),
        }
    }
}
