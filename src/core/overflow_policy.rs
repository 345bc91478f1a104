//! Overflow policies for the pending-record queue
//!
//! When the endpoint is unreachable for a long time records pile up in the
//! queue. A bounded queue keeps memory in check; these policies decide which
//! record is sacrificed when it is full.

use std::fmt;
use std::sync::Arc;

/// Policy for handling a full bounded queue
///
/// # Example
///
/// ```
/// use loki_logger_system::OverflowPolicy;
///
/// // Default behavior: keep the freshest records
/// let policy = OverflowPolicy::default();
/// assert_eq!(policy, OverflowPolicy::DropOldest);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued record to make room for the new one
    #[default]
    DropOldest,

    /// Reject the incoming record and keep the queue as it is
    DropNewest,
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropOldest => write!(f, "DropOldest"),
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
        }
    }
}

/// How many records may wait for delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    /// Limited only by memory
    Unbounded,
    /// At most this many records; the overflow policy applies beyond it
    Bounded(usize),
}

impl QueueCapacity {
    pub const DEFAULT_BOUND: usize = 10_000;

    pub fn limit(&self) -> Option<usize> {
        match self {
            QueueCapacity::Unbounded => None,
            QueueCapacity::Bounded(max) => Some(*max),
        }
    }
}

impl Default for QueueCapacity {
    fn default() -> Self {
        QueueCapacity::Bounded(Self::DEFAULT_BOUND)
    }
}

/// Callback type for overflow notifications
///
/// Called when records are dropped due to queue overflow.
/// The parameter is the total count of overflow drops so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
