//! Error types for the logger system

use crate::transport::TransportError;

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// Enqueue attempted after shutdown started
    #[error("Logger is shut down; record rejected")]
    Shutdown,

    /// Delivery to the ingestion endpoint failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A record could not be expressed in the push wire format
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Records abandoned because the final drain ran out of time
    #[error("Shutdown timeout expired with {pending} records still undelivered")]
    ShutdownTimeout { pending: usize },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl LoggerError {
    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        LoggerError::Encoding {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to the encoding class (malformed batch data)
    pub fn is_encoding(&self) -> bool {
        matches!(self, LoggerError::Encoding { .. } | LoggerError::JsonError(_))
    }
}
