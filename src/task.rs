//! Timers driven by the event loop: debounced input and simulated saves.
//!
//! Nothing here sleeps or spawns threads. Deadlines are compared against the
//! `Instant` handed in by the caller, which is checked on every model update.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

/// Collapses a burst of triggers into one evaluation once input has been
/// quiet for `delay`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Restarts the quiet period.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// True exactly once per burst, when the quiet period has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Fires immediately if something is pending.
    pub fn flush(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct PendingTask<T> {
    payload: T,
    deadline: Instant,
    token: CancelToken,
}

/// Simulated backend calls that complete after a fixed delay.
#[derive(Debug)]
pub struct TaskQueue<T> {
    delay: Duration,
    tasks: Vec<PendingTask<T>>,
}

impl<T: std::fmt::Debug> TaskQueue<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            tasks: Vec::new(),
        }
    }

    pub fn spawn(&mut self, payload: T, now: Instant) -> CancelToken {
        let token = CancelToken::default();
        debug!("Scheduling {:?} in {}ms", payload, self.delay.as_millis());
        self.tasks.push(PendingTask {
            payload,
            deadline: now + self.delay,
            token: token.clone(),
        });
        token
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Removes every task whose deadline passed. Cancelled ones are dropped,
    /// the others are returned in scheduling order.
    pub fn poll(&mut self, now: Instant) -> Vec<T> {
        let (due, pending): (Vec<_>, Vec<_>) = self
            .tasks
            .drain(..)
            .partition(|task| now >= task.deadline);
        self.tasks = pending;
        due.into_iter()
            .filter_map(|task| {
                if task.token.is_cancelled() {
                    trace!("Dropping cancelled task {:?}", task.payload);
                    None
                } else {
                    Some(task.payload)
                }
            })
            .collect()
    }
}

/// Enabled/disabled state of a submit button. While a submission is in
/// flight further submissions are refused.
#[derive(Debug, Default)]
pub struct SubmitGuard {
    in_flight: Option<CancelToken>,
}

impl SubmitGuard {
    pub fn is_enabled(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Takes the guard for `token`. Returns false (and leaves the running
    /// submission alone) when one is already in flight.
    pub fn try_begin(&mut self, token: CancelToken) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.in_flight = Some(token);
        true
    }

    pub fn finish(&mut self) {
        self.in_flight = None;
    }

    /// Cancels the running submission, if any, and re-enables the button.
    pub fn cancel(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }
}
