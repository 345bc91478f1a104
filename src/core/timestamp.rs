//! Timestamp utilities
//!
//! Record timestamps come from a per-logger [`MonotonicClock`] so that the
//! lines pushed for a stream never go backwards, even if the system clock
//! is stepped. Console output renders them through [`TimestampFormat`].

use super::error::{LoggerError, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Wall clock with nanosecond resolution that never repeats or goes backwards
///
/// Each call returns `max(now, previous + 1ns)`.
///
/// # Example
///
/// ```
/// use loki_logger_system::core::MonotonicClock;
///
/// let clock = MonotonicClock::new();
/// let first = clock.now();
/// let second = clock.now();
/// assert!(second > first);
/// ```
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_nanos: AtomicI64,
}

impl MonotonicClock {
    pub const fn new() -> Self {
        Self {
            last_nanos: AtomicI64::new(i64::MIN),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let Some(wall) = now.timestamp_nanos_opt() else {
            return now;
        };

        let mut last = self.last_nanos.load(Ordering::Relaxed);
        loop {
            let next = wall.max(last.saturating_add(1));
            match self.last_nanos.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Utc.timestamp_nanos(next),
                Err(actual) => last = actual,
            }
        }
    }
}

/// Unix epoch nanoseconds, the resolution of the push wire format
pub fn epoch_nanos(datetime: &DateTime<Utc>) -> Result<i64> {
    datetime.timestamp_nanos_opt().ok_or_else(|| {
        LoggerError::encoding(format!(
            "timestamp {} cannot be represented as epoch nanoseconds",
            datetime.to_rfc3339()
        ))
    })
}

/// Timestamp rendering for console echo
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// RFC 3339 format: `2025-01-08T10:30:45.123456+00:00`
    Rfc3339,

    /// Unix epoch nanoseconds, the same value that is pushed to Loki
    UnixNanos,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Iso8601Micros => datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::UnixNanos => datetime
                .timestamp_nanos_opt()
                .map(|nanos| nanos.to_string())
                .unwrap_or_else(|| datetime.to_rfc3339()),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }
}
