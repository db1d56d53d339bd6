//! Binary auto-reset event
//!
//! An [`Event`] holds at most one pending signal. [`Event::set`] raises it and
//! wakes one waiter; a successful wait consumes it, so the next wait blocks
//! again until the event is set anew.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A binary signal whose waits consume the pending signal
#[derive(Debug, Default)]
pub struct Event {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl Event {
    /// Create a new event in the non-signaled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Setting an already signaled event is a no-op.
    pub fn set(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.cond.notify_one();
    }

    /// Drop a pending signal without waiting
    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }

    /// Check whether a signal is pending
    pub fn is_set(&self) -> bool {
        *self.signaled.lock()
    }

    /// Block until the event is signaled, then consume the signal
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.cond.wait(&mut signaled);
        }
        *signaled = false;
    }

    /// Wait up to `timeout` for the signal.
    ///
    /// Returns `true` if the signal was consumed, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(deadline),
            None => {
                self.wait();
                true
            }
        }
    }

    /// Wait until `deadline` for the signal.
    ///
    /// Returns `true` if the signal was consumed, `false` on timeout.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.cond.wait_until(&mut signaled, deadline).timed_out() {
                break;
            }
        }
        std::mem::replace(&mut *signaled, false)
    }
}
