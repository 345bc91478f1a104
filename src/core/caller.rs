//! Caller identification
//!
//! Every level method on [`LokiLogger`](crate::LokiLogger) is
//! `#[track_caller]`, so the source location of the application's log call
//! is available without walking the stack. A [`CallerResolver`] turns that
//! location into the caller tag stored on the record. It runs synchronously
//! on the producer thread, once per log call.

use std::panic::Location;

pub trait CallerResolver: Send + Sync {
    fn identify(&self, location: &Location<'static>) -> Option<String>;
}

/// `file.rs:line` using only the file name of the call site (the default)
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLineResolver;

impl CallerResolver for FileLineResolver {
    fn identify(&self, location: &Location<'static>) -> Option<String> {
        let file = location
            .file()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_else(|| location.file());
        Some(format!("{}:{}", file, location.line()))
    }
}

/// Records carry no caller tag
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCaller;

impl CallerResolver for NoCaller {
    fn identify(&self, _location: &Location<'static>) -> Option<String> {
        None
    }
}

impl<F> CallerResolver for F
where
    F: Fn(&Location<'static>) -> Option<String> + Send + Sync,
{
    fn identify(&self, location: &Location<'static>) -> Option<String> {
        self(location)
    }
}
