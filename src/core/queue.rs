//! Pending-record queue
//!
//! Many producer threads push, one dispatcher drains. Pushing never waits on
//! anything but the queue lock, and draining never blocks: the dispatcher
//! waits for its flush triggers on its own control channel.

use super::error::{LoggerError, Result};
use super::overflow_policy::{OverflowPolicy, QueueCapacity};
use super::record::Record;
use super::timestamp::MonotonicClock;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// What happened to a pushed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Queued; `depth` is the queue length afterwards
    Queued { depth: usize },
    /// Queued after evicting the oldest record (drop-oldest overflow)
    Evicted { depth: usize },
    /// Not queued because the queue was full (drop-newest overflow)
    Rejected,
}

impl Admission {
    pub fn overflowed(&self) -> bool {
        !matches!(self, Admission::Queued { .. })
    }
}

struct QueueState {
    records: VecDeque<Record>,
    closed: bool,
}

pub struct RecordQueue {
    state: Mutex<QueueState>,
    capacity: QueueCapacity,
    policy: OverflowPolicy,
    wake_armed: AtomicBool,
}

impl RecordQueue {
    pub fn new(capacity: QueueCapacity, policy: OverflowPolicy) -> Self {
        Self {
            state: Mutex::new(QueueState {
                records: VecDeque::new(),
                closed: false,
            }),
            capacity,
            policy,
            wake_armed: AtomicBool::new(false),
        }
    }

    /// Append a record, applying the overflow policy when bounded and full
    ///
    /// Fails with [`LoggerError::Shutdown`] once the queue is closed.
    pub fn push(&self, record: Record) -> Result<Admission> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LoggerError::Shutdown);
        }
        Ok(self.admit(&mut state, record))
    }

    /// Like [`push`](Self::push), but takes the record's timestamp from
    /// `clock` while the queue lock is held
    ///
    /// Queue order and timestamp order are then the same thing, so the
    /// lines of a stream never go backwards in time however many producers
    /// race. Returns the timestamp that was assigned.
    pub fn push_stamped(
        &self,
        mut record: Record,
        clock: &MonotonicClock,
    ) -> Result<(Admission, DateTime<Utc>)> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LoggerError::Shutdown);
        }
        let timestamp = clock.now();
        record.set_timestamp(timestamp);
        Ok((self.admit(&mut state, record), timestamp))
    }

    fn admit(&self, state: &mut QueueState, record: Record) -> Admission {
        let full = self
            .capacity
            .limit()
            .is_some_and(|max| state.records.len() >= max);

        if !full {
            state.records.push_back(record);
            return Admission::Queued {
                depth: state.records.len(),
            };
        }

        match self.policy {
            OverflowPolicy::DropNewest => Admission::Rejected,
            OverflowPolicy::DropOldest => {
                state.records.pop_front();
                state.records.push_back(record);
                Admission::Evicted {
                    depth: state.records.len(),
                }
            }
        }
    }

    /// Remove up to `max` records in FIFO order; empty when nothing is pending
    pub fn drain(&self, max: usize) -> Vec<Record> {
        let mut state = self.state.lock();
        let take = max.min(state.records.len());
        state.records.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refuse further pushes; already queued records stay drainable
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns `true` if the caller should send a wake-up to the dispatcher
    ///
    /// Only the first caller after a [`disarm`](Self::disarm) gets `true`, so
    /// a burst of producers crossing the threshold sends a single wake-up.
    pub(crate) fn arm_wake(&self) -> bool {
        !self.wake_armed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn disarm(&self) {
        self.wake_armed.store(false, Ordering::Release);
    }
}
