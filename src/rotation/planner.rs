//! Backup-and-rotate cycle
//!
//! One run lists the store, creates today's backup if it is missing, then
//! deletes every backup no retention rule keeps. Creation always completes
//! before anything is classified or deleted: if the dump or upload fails the
//! run aborts with the store untouched.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use super::evaluator::{Decision, RetentionEvaluator};
use super::identity::BackupIdentity;
use super::layout::KeyLayout;
use super::policy::RetentionPolicy;
use crate::clock::Clock;
use crate::dump::Dumper;
use crate::error::{SpinError, SpinResult};
use crate::storage::ObjectStore;

/// A backup found in (or just written to) the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBackup {
    pub key: String,
    pub identity: BackupIdentity,
}

/// A stored backup together with its retention decision
#[derive(Debug, Clone)]
pub struct PlannedBackup {
    pub backup: StoredBackup,
    pub decision: Decision,
}

/// What a run would do, computed without touching the store
#[derive(Debug, Clone)]
pub struct RotationPlan {
    pub today: NaiveDate,
    /// Key today's backup would be created under, if none exists yet
    pub create: Option<String>,
    /// Every known backup, newest first
    pub entries: Vec<PlannedBackup>,
}

impl RotationPlan {
    pub fn kept(&self) -> impl Iterator<Item = &PlannedBackup> {
        self.entries.iter().filter(|entry| entry.decision.is_keep())
    }

    pub fn purged(&self) -> impl Iterator<Item = &PlannedBackup> {
        self.entries.iter().filter(|entry| !entry.decision.is_keep())
    }
}

/// A deletion that failed; the run carries on with the others
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeFailure {
    pub key: String,
    pub reason: String,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Today's backup, if this run created it
    pub created: Option<StoredBackup>,
    /// Backups retained after the run, newest first
    pub kept: Vec<StoredBackup>,
    /// Keys deleted by this run
    pub purged: Vec<String>,
    /// Deletions that failed
    pub failures: Vec<PurgeFailure>,
}

impl RunReport {
    /// Whether every planned deletion succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Human-readable one-line summary
    pub fn summary(&self) -> String {
        let created = match &self.created {
            Some(backup) => format!("created {}", backup.key),
            None => "today's backup already present".to_string(),
        };
        let mut summary = format!(
            "{}; {} kept, {} purged",
            created,
            self.kept.len(),
            self.purged.len()
        );
        if !self.failures.is_empty() {
            summary.push_str(&format!(", {} failed to purge", self.failures.len()));
        }
        summary
    }
}

/// Drives backup-and-rotate cycles against one store
pub struct RotationPlanner<'a> {
    store: &'a dyn ObjectStore,
    layout: &'a KeyLayout,
    policy: &'a RetentionPolicy,
    clock: &'a dyn Clock,
}

impl<'a> RotationPlanner<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        layout: &'a KeyLayout,
        policy: &'a RetentionPolicy,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            store,
            layout,
            policy,
            clock,
        }
    }

    /// All backups in the store, newest first
    ///
    /// Keys the layout does not recognise are skipped.
    pub fn inventory(&self) -> SpinResult<Vec<StoredBackup>> {
        let prefix = self.layout.prefix();
        let keys = self
            .store
            .list(&prefix)
            .map_err(|e| SpinError::Listing(e.to_string()))?;

        let mut backups: Vec<StoredBackup> = keys
            .into_iter()
            .filter_map(|key| match self.layout.identify(&key) {
                Some(identity) => Some(StoredBackup { key, identity }),
                None => {
                    debug!(key = %key, "skipping object that is not a backup");
                    None
                }
            })
            .collect();

        backups.sort_by(|a, b| {
            b.identity
                .datetime()
                .cmp(&a.identity.datetime())
                .then_with(|| b.key.cmp(&a.key))
        });

        Ok(backups)
    }

    /// Compute what `run` would do, without creating or deleting anything
    pub fn plan(&self) -> SpinResult<RotationPlan> {
        let now = self.clock.now();
        let today = now.date();
        let backups = self.inventory()?;

        let create = if has_backup_for(&backups, today) {
            None
        } else {
            Some(self.layout.key_for(&BackupIdentity::taken_at(now)))
        };

        Ok(RotationPlan {
            today,
            create,
            entries: self.classify(backups, today),
        })
    }

    /// Run one full cycle
    ///
    /// # Errors
    ///
    /// Fails with [`SpinError::Listing`] if the store cannot be listed and
    /// [`SpinError::Creation`] if today's backup cannot be dumped or uploaded.
    /// In both cases nothing has been deleted. Individual deletion failures are
    /// reported in the returned [`RunReport`] instead.
    pub fn run(&self, dumper: &dyn Dumper) -> SpinResult<RunReport> {
        let now = self.clock.now();
        let today = now.date();

        info!(prefix = %self.layout.prefix(), "checking stored backups");
        let mut backups = self.inventory()?;
        info!(count = backups.len(), "found backups");

        let created = if has_backup_for(&backups, today) {
            info!(%today, "backup for today already exists");
            None
        } else {
            let backup = self.create_backup(now, dumper)?;
            backups.insert(0, backup.clone());
            Some(backup)
        };

        info!(policy = %self.policy.describe(), "rotating backups");
        let mut report = RunReport {
            created,
            ..Default::default()
        };

        for entry in self.classify(backups, today) {
            match entry.decision {
                Decision::Keep(reason) => {
                    debug!(key = %entry.backup.key, %reason, "keeping");
                    report.kept.push(entry.backup);
                }
                Decision::Purge => {
                    let key = entry.backup.key;
                    info!(key = %key, "purging");
                    match self.store.delete(&key) {
                        Ok(()) => report.purged.push(key),
                        Err(e) => {
                            warn!(key = %key, error = %e, "failed to purge backup");
                            report.failures.push(PurgeFailure {
                                key,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        info!(summary = %report.summary(), "rotation done");
        Ok(report)
    }

    /// Dump the database to a staging directory and upload it as today's backup
    fn create_backup(&self, now: NaiveDateTime, dumper: &dyn Dumper) -> SpinResult<StoredBackup> {
        let identity = BackupIdentity::taken_at(now);
        let key = self.layout.key_for(&identity);
        let creation_error = |reason: String| SpinError::Creation {
            key: key.clone(),
            reason,
        };

        info!(key = %key, "creating backup for {}", identity);

        // Removed on drop, whether or not the dump succeeds
        let staging = tempfile::Builder::new()
            .prefix("spindb_")
            .tempdir()
            .map_err(|e| creation_error(format!("Failed to create staging directory: {}", e)))?;

        let file_name = key
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("dump");
        let local_path = staging.path().join(file_name);

        dumper
            .dump_to_file(&local_path)
            .map_err(|e| creation_error(e.to_string()))?;

        info!(key = %key, "uploading");
        self.store
            .put(&key, &local_path)
            .map_err(|e| creation_error(e.to_string()))?;

        Ok(StoredBackup { key, identity })
    }

    fn classify(&self, backups: Vec<StoredBackup>, today: NaiveDate) -> Vec<PlannedBackup> {
        let evaluator = RetentionEvaluator::new(self.policy, today);
        backups
            .into_iter()
            .map(|backup| PlannedBackup {
                decision: evaluator.evaluate(&backup.identity),
                backup,
            })
            .collect()
    }
}

fn has_backup_for(backups: &[StoredBackup], date: NaiveDate) -> bool {
    backups.iter().any(|backup| backup.identity.matches(date))
}
