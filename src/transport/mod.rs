//! Delivery of encoded push requests
//!
//! The dispatcher thread owns exactly one [`Transport`] for the lifetime of
//! the logger and calls it serially, so implementations need no locking of
//! their own.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::HttpTransport;

/// HTTP status code as reported by a transport
pub type StatusCode = u16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The endpoint answered with a non-2xx status
    #[error("endpoint answered with status {code}: {body}")]
    Status { code: StatusCode, body: String },

    /// Connection-level failure (DNS, refused, TLS, timeout, ...)
    #[error("network failure: {0}")]
    Network(String),

    /// The endpoint URL cannot be used
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The transport implementation panicked during a send
    #[error("transport panicked: {0}")]
    Panicked(String),
}

impl TransportError {
    /// Status code of the response, when there was one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Sender of encoded push payloads
///
/// # Example
///
/// ```
/// use loki_logger_system::transport::{StatusCode, Transport, TransportError};
///
/// struct Discard;
///
/// impl Transport for Discard {
///     fn send(&mut self, _payload: &[u8]) -> Result<StatusCode, TransportError> {
///         Ok(204)
///     }
///
///     fn name(&self) -> &str {
///         "discard"
///     }
/// }
/// ```
pub trait Transport: Send {
    /// Push one JSON payload; `Ok` only for a 2xx answer
    fn send(&mut self, payload: &[u8]) -> Result<StatusCode, TransportError>;

    fn name(&self) -> &str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, payload: &[u8]) -> Result<StatusCode, TransportError> {
        (**self).send(payload)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
