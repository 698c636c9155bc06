//! Deadline evaluation.
//!
//! Deadlines are passive: nothing fires when one passes. A session past its
//! deadline stays usable; the deadline only decides how a finish is reported.

use std::sync::Mutex;
use crate::session::SessionInstance;
use crate::Time;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> Time;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Time {
        chrono::Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Time>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: Time) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Move the clock to `time`.
    pub fn set(&self, time: Time) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = time;
    }

    /// Move the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Whether `instance` has run out of time at `now`.
pub fn timed_out(instance: &SessionInstance, now: Time) -> bool {
    now >= instance.deadline()
}
