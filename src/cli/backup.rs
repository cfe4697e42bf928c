//! Backup CLI commands
//!
//! Implements the run/plan/list/status commands on top of the rotation planner.

use chrono::NaiveDateTime;
use clap::Subcommand;

use crate::clock::{Clock, SystemClock};
use crate::config::settings::{RuntimeConfig, Settings};
use crate::error::SpinResult;
use crate::health::{self, HealthStatus};
use crate::rotation::{Decision, RotationPlanner};
use crate::storage::LocalObjectStore;

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create today's backup if missing, then purge expired ones
    Run,

    /// Show what a run would create, keep and purge
    Plan,

    /// List stored backups, newest first
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check that a recent backup exists
    Status,
}

/// Handle a backup command
///
/// Returns `Ok(false)` when the command finished but the outcome should still
/// fail the process: a run with purge failures, or a status check in error.
pub fn handle_backup_command(
    settings: &Settings,
    config: &RuntimeConfig,
    cmd: BackupCommands,
) -> SpinResult<bool> {
    execute(settings, config, &SystemClock, cmd)
}

fn execute(
    settings: &Settings,
    config: &RuntimeConfig,
    clock: &dyn Clock,
    cmd: BackupCommands,
) -> SpinResult<bool> {
    let store = LocalObjectStore::new(config.bucket_dir.clone());
    let planner = RotationPlanner::new(&store, &config.layout, &config.policy, clock);

    match cmd {
        BackupCommands::Run => {
            let dumper = settings.dumper()?;
            let report = planner.run(dumper.as_ref())?;

            println!("{}", report.summary());
            for key in &report.purged {
                println!("  purged {}", key);
            }

            if !report.is_complete() {
                println!();
                println!("Failed to purge {} backup(s):", report.failures.len());
                for failure in &report.failures {
                    println!("  {}: {}", failure.key, failure.reason);
                }
                return Ok(false);
            }
        }

        BackupCommands::Plan => {
            let plan = planner.plan()?;

            println!("Rotation Plan for {}", plan.today);
            println!("=========================");
            println!("Policy: {}", config.policy.describe());
            println!();

            match &plan.create {
                Some(key) => println!("Would create: {}", key),
                None => println!("Today's backup already present"),
            }

            if plan.entries.is_empty() {
                println!("No stored backups.");
                return Ok(true);
            }

            println!();
            for entry in &plan.entries {
                let verdict = match entry.decision {
                    Decision::Keep(reason) => format!("KEEP ({})", reason),
                    Decision::Purge => "PURGE".to_string(),
                };
                println!("  {:<16} {}", verdict, entry.backup.key);
            }

            println!();
            println!(
                "Total: {} kept, {} to purge",
                plan.kept().count(),
                plan.purged().count()
            );
        }

        BackupCommands::List { verbose } => {
            let backups = planner.inventory()?;

            if backups.is_empty() {
                println!("No backups found.");
                println!("Create one with: spindb run");
                return Ok(true);
            }

            println!("Available Backups");
            println!("=================");
            println!();

            let now = clock.now();
            for (i, backup) in backups.iter().enumerate() {
                let age_str = format_age(now, backup.identity.datetime());

                if verbose {
                    println!(
                        "{}. {}\n   Taken: {}\n   Age: {}\n",
                        i + 1,
                        backup.key,
                        backup.identity,
                        age_str,
                    );
                } else {
                    println!("  {}. {} ({} ago)", i + 1, backup.key, age_str);
                }
            }

            println!();
            println!("Total: {} backup(s)", backups.len());
        }

        BackupCommands::Status => {
            let backups = planner.inventory()?;
            let report = health::check(backups.iter().map(|b| &b.identity), clock.now());

            println!("{}: {}", report.status, report.message);
            return Ok(report.status != HealthStatus::Error);
        }
    }

    Ok(true)
}

/// Time since `taken`, in human-readable form
fn format_age(now: NaiveDateTime, taken: NaiveDateTime) -> String {
    format_duration(now.signed_duration_since(taken))
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    let months = days / 30;
    format!("{}mo", months)
}
