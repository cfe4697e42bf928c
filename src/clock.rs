//! Wall-clock access
//!
//! "Today" drives both naming today's backup and the retention windows, so it
//! is injected rather than read ad hoc.

use chrono::{Local, NaiveDateTime};

/// Source of the current local date and time
pub trait Clock {
    /// Current local date and time
    fn now(&self) -> NaiveDateTime;
}

/// The system clock in the local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(NaiveDateTime);

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
