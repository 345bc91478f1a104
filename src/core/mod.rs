//! Core logger types and traits

pub mod caller;
pub mod config;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod labels;
pub mod log_level;
pub mod logger;
pub mod metrics;
pub mod overflow_policy;
pub mod queue;
pub mod record;
pub mod retry;
pub mod timestamp;

pub use caller::{CallerResolver, FileLineResolver, NoCaller};
pub use config::{
    Credentials, LoggerConfig, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use dispatcher::{DeliveryFailure, DispatcherState, FailureCallback};
pub use encoder::{encode, Batch, StreamBatch};
pub use error::{LoggerError, Result};
pub use labels::{sanitize_label_name, LabelSet};
pub use log_level::LogLevel;
pub use logger::{LokiLogger, LokiLoggerBuilder};
pub use metrics::LoggerMetrics;
pub use overflow_policy::{OverflowCallback, OverflowPolicy, QueueCapacity};
pub use queue::{Admission, RecordQueue};
pub use record::Record;
pub use retry::RetryPolicy;
pub use timestamp::{epoch_nanos, MonotonicClock, TimestampFormat};
