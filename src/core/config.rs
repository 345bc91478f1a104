//! Construction-time configuration

use super::error::{LoggerError, Result};
use super::labels::LabelSet;
use super::log_level::LogLevel;
use super::overflow_policy::{OverflowPolicy, QueueCapacity};
use super::retry::RetryPolicy;
use super::timestamp::TimestampFormat;
use std::time::Duration;

/// Default shutdown timeout for the final drain (5 seconds)
///
/// This timeout is used when the logger is dropped without explicit shutdown.
/// For custom timeout control, use [`LokiLogger::shutdown`](crate::LokiLogger::shutdown).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Label carrying the logger name
pub const JOB_LABEL: &str = "job";
/// Label carrying the record level
pub const LEVEL_LABEL: &str = "level";

/// Basic auth credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Logger identity, pushed as the `job` label unless `labels` overrides it
    pub name: String,
    /// Loki server URL; the push path is appended when missing
    pub endpoint: Option<String>,
    pub credentials: Option<Credentials>,
    /// Sent as `X-Scope-OrgID`
    pub tenant: Option<String>,
    /// Labels attached to every record
    pub labels: LabelSet,
    pub min_level: LogLevel,
    /// Queue depth that triggers an immediate flush, and the per-push cap
    pub batch_size: usize,
    /// Longest time a record waits before a flush is attempted
    pub flush_interval: Duration,
    pub retry: RetryPolicy,
    pub queue_capacity: QueueCapacity,
    pub overflow_policy: OverflowPolicy,
    /// Bound on the final drain at shutdown
    pub shutdown_timeout: Duration,
    pub request_timeout: Duration,
    pub console_echo: bool,
    pub console_timestamp_format: TimestampFormat,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            endpoint: None,
            credentials: None,
            tenant: None,
            labels: LabelSet::new(),
            min_level: LogLevel::Info,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            retry: RetryPolicy::default(),
            queue_capacity: QueueCapacity::default(),
            overflow_policy: OverflowPolicy::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            console_echo: true,
            console_timestamp_format: TimestampFormat::default(),
        }
    }
}

impl LoggerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LoggerError::config("name", "must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(LoggerError::config("batch_size", "must be greater than zero"));
        }
        if self.flush_interval.is_zero() {
            return Err(LoggerError::config("flush_interval", "must be greater than zero"));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(LoggerError::config(
                "backoff",
                format!(
                    "base delay {:?} exceeds cap {:?}",
                    self.retry.base_delay, self.retry.max_delay
                ),
            ));
        }
        if let QueueCapacity::Bounded(max) = self.queue_capacity {
            if max < self.batch_size {
                return Err(LoggerError::config(
                    "queue_capacity",
                    format!("bound {} is smaller than batch size {}", max, self.batch_size),
                ));
            }
        }
        Ok(())
    }

    /// Labels every record starts from: `job` = name, then the configured labels
    pub fn base_labels(&self) -> LabelSet {
        let mut labels = LabelSet::new();
        labels.insert(JOB_LABEL, self.name.clone());
        labels.extend(self.labels.iter());
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LoggerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.flush_interval, Duration::from_secs(5));
        assert!(config.console_echo);
    }

    #[test]
    fn test_validation_failures() {
        let config = LoggerConfig {
            batch_size: 0,
            ..LoggerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LoggerError::InvalidConfiguration { .. })
        ));

        let config = LoggerConfig {
            queue_capacity: QueueCapacity::Bounded(5),
            batch_size: 10,
            ..LoggerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = LoggerConfig {
            retry: RetryPolicy::new(1, Duration::from_secs(10), Duration::from_secs(1)),
            ..LoggerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_labels_job_can_be_overridden() {
        let mut config = LoggerConfig {
            name: "billing".to_string(),
            ..LoggerConfig::default()
        };
        assert_eq!(config.base_labels().get(JOB_LABEL), Some("billing"));

        config.labels.insert("job", "custom");
        config.labels.insert("env", "prod");
        let labels = config.base_labels();
        assert_eq!(labels.get(JOB_LABEL), Some("custom"));
        assert_eq!(labels.get("env"), Some("prod"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials {
            username: "user".to_string(),
            password: "hunter2".to_string(),
        };
        assert!(!format!("{:?}", credentials).contains("hunter2"));
    }
}
