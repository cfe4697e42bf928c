//! Identity of a single dated backup

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// One backup instance: its calendar date and, optionally, the time it was taken
///
/// Two identities are equal when their dates are equal. The time is carried as
/// metadata for display and freshness checks only.
#[derive(Debug, Clone, Copy)]
pub struct BackupIdentity {
    date: NaiveDate,
    time: Option<NaiveTime>,
}

impl BackupIdentity {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Self { date, time }
    }

    /// Identity of a backup taken at the given instant
    pub fn taken_at(now: NaiveDateTime) -> Self {
        Self {
            date: now.date(),
            time: Some(now.time()),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    /// Check if this backup is for the given date
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.date == date
    }

    /// Combined date and time, midnight when no time was recorded
    pub fn datetime(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }
}

impl PartialEq for BackupIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.date == other.date
    }
}

impl Eq for BackupIdentity {}

impl Hash for BackupIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.date.hash(state);
    }
}

impl PartialOrd for BackupIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BackupIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date.cmp(&other.date)
    }
}

impl fmt::Display for BackupIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.time {
            Some(time) => write!(f, "{} {}", self.date, time.format("%H:%M:%S")),
            None => write!(f, "{}", self.date),
        }
    }
}
