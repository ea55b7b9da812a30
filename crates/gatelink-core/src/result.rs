//! Single-assignment completion cell for outbound requests.
//!
//! A [`PendingResult`] is shared between the thread that issued a request
//! (which blocks in [`PendingResult::get_timeout`]) and the reactor thread
//! that resolves it when the matching response frame arrives. The first
//! terminal transition wins; a completed result stays completed.

use crate::error::ResultError;
use crate::lock;
use crate::message::Message;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Observable state of a [`PendingResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultState {
    /// No outcome yet
    Waiting,
    /// A response arrived
    Completed,
    /// Cancelled before a response arrived
    Cancelled,
    /// A waiter gave up
    TimedOut,
}

#[derive(Debug)]
enum Slot {
    Waiting,
    Completed(Message),
    Cancelled,
    TimedOut,
}

impl Slot {
    fn state(&self) -> ResultState {
        match self {
            Self::Waiting => ResultState::Waiting,
            Self::Completed(_) => ResultState::Completed,
            Self::Cancelled => ResultState::Cancelled,
            Self::TimedOut => ResultState::TimedOut,
        }
    }

    fn outcome(&self) -> Option<Result<Message, ResultError>> {
        match self {
            Self::Waiting => None,
            Self::Completed(message) => Some(Ok(message.clone())),
            Self::Cancelled => Some(Err(ResultError::Cancelled)),
            Self::TimedOut => Some(Err(ResultError::Timeout)),
        }
    }
}

#[derive(Debug)]
struct Inner {
    request_id: i32,
    slot: Mutex<Slot>,
    ready: Condvar,
}

/// Completion cell correlating a request id to its eventual response.
///
/// Cloning yields another handle to the same cell.
#[derive(Debug, Clone)]
pub struct PendingResult {
    inner: Arc<Inner>,
}

impl PendingResult {
    /// Create a waiting result for `request_id`.
    #[must_use]
    pub fn new(request_id: i32) -> Self {
        Self {
            inner: Arc::new(Inner {
                request_id,
                slot: Mutex::new(Slot::Waiting),
                ready: Condvar::new(),
            }),
        }
    }

    /// Request id this result answers.
    #[must_use]
    pub fn request_id(&self) -> i32 {
        self.inner.request_id
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ResultState {
        lock(&self.inner.slot).state()
    }

    /// True while no outcome has been recorded.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.state() == ResultState::Waiting
    }

    /// True once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state() == ResultState::Cancelled
    }

    /// True once timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.state() == ResultState::TimedOut
    }

    /// The response, if one has been recorded.
    #[must_use]
    pub fn response(&self) -> Option<Message> {
        match &*lock(&self.inner.slot) {
            Slot::Completed(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// Record the response. Returns `false` if the result had already left
    /// the waiting state, in which case the response is dropped.
    pub fn set_result(&self, message: Message) -> bool {
        self.finish(Slot::Completed(message))
    }

    /// Cancel the request. No effect once an outcome exists.
    pub fn cancel(&self) -> bool {
        self.finish(Slot::Cancelled)
    }

    /// Mark the request as timed out. No effect once an outcome exists.
    pub fn timeout(&self) -> bool {
        self.finish(Slot::TimedOut)
    }

    fn finish(&self, outcome: Slot) -> bool {
        let mut slot = lock(&self.inner.slot);
        if !matches!(*slot, Slot::Waiting) {
            return false;
        }
        *slot = outcome;
        self.inner.ready.notify_all();
        true
    }

    /// Block until an outcome exists.
    ///
    /// # Errors
    ///
    /// [`ResultError::Cancelled`] or [`ResultError::Timeout`] if the request
    /// ended without a response.
    pub fn get(&self) -> Result<Message, ResultError> {
        let mut slot = lock(&self.inner.slot);
        loop {
            if let Some(outcome) = slot.outcome() {
                return outcome;
            }
            slot = self
                .inner
                .ready
                .wait(slot)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`. If no outcome arrives in time the result
    /// transitions to [`ResultState::TimedOut`].
    ///
    /// # Errors
    ///
    /// [`ResultError::Cancelled`] or [`ResultError::Timeout`].
    pub fn get_timeout(&self, timeout: Duration) -> Result<Message, ResultError> {
        let mut slot = lock(&self.inner.slot);
        if let Some(outcome) = slot.outcome() {
            return outcome;
        }
        // Bounds past the end of the clock mean "no bound"
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            drop(slot);
            return self.get();
        };
        loop {
            if let Some(outcome) = slot.outcome() {
                return outcome;
            }
            let now = Instant::now();
            if now >= deadline {
                *slot = Slot::TimedOut;
                self.inner.ready.notify_all();
                return Err(ResultError::Timeout);
            }
            slot = self
                .inner
                .ready
                .wait_timeout(slot, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }
}
