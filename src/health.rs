//! Backup freshness check
//!
//! Reports on the newest backup in the store: under a day old is healthy,
//! under two days old is a warning, anything older (or no backup at all) is an
//! error.

use std::fmt;

use chrono::{Duration, NaiveDateTime};

use crate::rotation::BackupIdentity;

/// Severity of a freshness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of a freshness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
    /// The newest backup, if any
    pub latest: Option<BackupIdentity>,
}

/// Check how recent the newest of `backups` is, as of `now`
pub fn check<'a, I>(backups: I, now: NaiveDateTime) -> HealthReport
where
    I: IntoIterator<Item = &'a BackupIdentity>,
{
    let latest = backups
        .into_iter()
        .max_by_key(|identity| identity.datetime())
        .copied();

    let Some(latest) = latest else {
        return HealthReport {
            status: HealthStatus::Error,
            message: "No backups found".to_string(),
            latest: None,
        };
    };

    let taken = latest.datetime();
    let status = if taken > now - Duration::days(1) {
        HealthStatus::Ok
    } else if taken > now - Duration::days(2) {
        HealthStatus::Warning
    } else {
        HealthStatus::Error
    };

    HealthReport {
        status,
        message: format!("Last backup {}", latest),
        latest: Some(latest),
    }
}
