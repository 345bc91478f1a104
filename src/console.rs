//! Console echo of log records

use crate::core::{LogLevel, Record, TimestampFormat};
#[cfg(feature = "console")]
use colored::Colorize;

/// Mirrors records to the terminal as they are logged
///
/// Error and Critical lines go to stderr, everything else to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleEcho {
    use_colors: bool,
    timestamp_format: TimestampFormat,
}

impl ConsoleEcho {
    pub fn new() -> Self {
        Self {
            use_colors: cfg!(feature = "console"),
            timestamp_format: TimestampFormat::default(),
        }
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    pub fn echo(&self, logger_name: &str, record: &Record) {
        let output = self.format(logger_name, record);
        match record.level() {
            LogLevel::Error | LogLevel::Critical => eprintln!("{}", output),
            _ => println!("{}", output),
        }
    }

    /// `[timestamp] [LEVEL] name - [caller] message`
    pub fn format(&self, logger_name: &str, record: &Record) -> String {
        format!(
            "[{}] [{}] {} - {}",
            self.timestamp_format.format(record.timestamp()),
            self.level_str(record.level()),
            logger_name,
            record.line()
        )
    }

    #[cfg(feature = "console")]
    fn level_str(&self, level: LogLevel) -> String {
        let padded = format!("{:5}", level.to_str());
        if self.use_colors {
            padded.color(level.color_code()).to_string()
        } else {
            padded
        }
    }

    #[cfg(not(feature = "console"))]
    fn level_str(&self, level: LogLevel) -> String {
        format!("{:5}", level.to_str())
    }
}

impl Default for ConsoleEcho {
    fn default() -> Self {
        Self::new()
    }
}
