//! Log record structure

use super::labels::LabelSet;
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One log call
///
/// The timestamp is assigned by the queue at enqueue. Ownership moves into
/// the queue on enqueue and into the dispatcher on drain; a record is never
/// mutated once it has been handed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: String,
    labels: LabelSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    caller: Option<String>,
}

impl Record {
    pub fn new(
        timestamp: DateTime<Utc>,
        level: LogLevel,
        message: impl Into<String>,
        labels: LabelSet,
    ) -> Self {
        Self {
            timestamp,
            level,
            message: message.into(),
            labels,
            caller: None,
        }
    }

    #[must_use]
    pub fn with_caller(mut self, caller: Option<String>) -> Self {
        self.caller = caller;
        self
    }

    pub(crate) fn set_timestamp(&mut self, timestamp: DateTime<Utc>) {
        self.timestamp = timestamp;
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    /// The log line as pushed: `[caller] message`, or just the message
    pub fn line(&self) -> String {
        match &self.caller {
            Some(caller) => format!("[{}] {}", caller, self.message),
            None => self.message.clone(),
        }
    }
}
