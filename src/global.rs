//! Process-wide default logger
//!
//! The default logger is ordinary process state with an explicit lifecycle:
//! it exists only after [`init`] or [`get_or_init`] and is torn down by
//! [`shutdown`]. Loggers built directly with
//! [`LokiLogger::builder`](crate::LokiLogger::builder) are independent of it.

use crate::core::{LoggerError, LokiLogger, LokiLoggerBuilder, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

static DEFAULT_LOGGER: Mutex<Option<Arc<LokiLogger>>> = parking_lot::const_mutex(None);

/// Build and install the default logger
///
/// Fails with [`LoggerError::InvalidConfiguration`] when one is already
/// installed; call [`shutdown`] first to replace it.
pub fn init(builder: LokiLoggerBuilder) -> Result<Arc<LokiLogger>> {
    let mut slot = DEFAULT_LOGGER.lock();
    if let Some(existing) = slot.as_ref() {
        return Err(LoggerError::config(
            "global",
            format!("default logger '{}' is already installed", existing.name()),
        ));
    }
    let logger = Arc::new(builder.build()?);
    *slot = Some(Arc::clone(&logger));
    Ok(logger)
}

/// Return the default logger, building it with `make` on first use
pub fn get_or_init<F>(make: F) -> Result<Arc<LokiLogger>>
where
    F: FnOnce() -> LokiLoggerBuilder,
{
    let mut slot = DEFAULT_LOGGER.lock();
    if let Some(existing) = slot.as_ref() {
        return Ok(Arc::clone(existing));
    }
    let logger = Arc::new(make().build()?);
    *slot = Some(Arc::clone(&logger));
    Ok(logger)
}

pub fn get() -> Option<Arc<LokiLogger>> {
    DEFAULT_LOGGER.lock().clone()
}

/// Uninstall the default logger and drain it
///
/// Returns `true` when there was nothing to shut down or the drain finished
/// within `timeout`. Clones handed out earlier stay usable but refuse new
/// records.
pub fn shutdown(timeout: Duration) -> bool {
    let logger = DEFAULT_LOGGER.lock().take();
    match logger {
        Some(logger) => logger.shutdown(timeout),
        None => true,
    }
}
