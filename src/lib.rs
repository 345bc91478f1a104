//! # Loki Logger System
//!
//! A non-blocking log shipper for [Grafana Loki](https://grafana.com/oss/loki/).
//!
//! Application threads hand records to an in-memory queue and return
//! immediately. A dedicated dispatcher thread groups queued records into
//! streams by label set and pushes them to Loki's HTTP push API in batches,
//! retrying failed pushes with exponential backoff.
//!
//! ## Features
//!
//! - **Non-blocking**: logging never waits on the network
//! - **Batching**: size and time triggers, one push request per batch
//! - **Resilient delivery**: bounded retries with capped, optionally jittered backoff
//! - **Bounded shutdown**: a final drain that never outlives its timeout
//! - **Pluggable**: custom transports and caller resolvers
//!
//! ## Example
//!
//! ```no_run
//! use loki_logger_system::prelude::*;
//! use loki_logger_system::info;
//!
//! let logger = LokiLogger::builder("checkout")
//!     .endpoint("http://localhost:3100")
//!     .label("env", "production")
//!     .build()?;
//!
//! info!(logger, "order {} accepted", 1042)?;
//! logger.log_with_labels(LogLevel::Warn, "slow payment provider", [("provider", "acme")])?;
//! # Ok::<(), LoggerError>(())
//! ```

pub mod console;
pub mod core;
pub mod global;
pub mod macros;
pub mod transport;

pub mod prelude {
    pub use crate::core::{
        DeliveryFailure, DispatcherState, LabelSet, LogLevel, LoggerConfig, LoggerError,
        LoggerMetrics, LokiLogger, LokiLoggerBuilder, OverflowPolicy, QueueCapacity, Result,
        RetryPolicy, TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::transport::{Transport, TransportError};
}

pub use console::ConsoleEcho;
pub use core::{
    DeliveryFailure, DispatcherState, LabelSet, LogLevel, LoggerConfig, LoggerError, LoggerMetrics,
    LokiLogger, LokiLoggerBuilder, OverflowPolicy, QueueCapacity, Record, Result, RetryPolicy,
    TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use transport::{StatusCode, Transport, TransportError};
