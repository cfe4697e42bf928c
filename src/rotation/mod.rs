//! Backup rotation
//!
//! Naming backups, finding them again, and deciding which ones to keep.
//!
//! # Architecture
//!
//! - `PathTemplate`: renders keys from `{placeholder}` patterns and compiles
//!   them into matchers that parse keys back
//! - `KeyLayout`: binds a template to its fixed values and date/time formats
//! - `BackupIdentity`: the date (and optional time) of one backup
//! - `RetentionPolicy`: daily/weekly/monthly/yearly tiers
//! - `RetentionEvaluator`: keep/purge decision for one backup
//! - `RotationPlanner`: the backup-and-rotate cycle
//!
//! # Example
//!
//! ```rust,ignore
//! use spindb::rotation::{KeyLayout, PathTemplate, RetentionPolicy, RotationPlanner};
//!
//! let template = PathTemplate::new("{baseurl}/db_{date}{ext}")?;
//! let layout = KeyLayout::new(&template, &[("baseurl", "site.com"), ("ext", ".sql")], "%Y-%m-%d", "%H.%M.%S")?;
//! let policy = RetentionPolicy::default();
//!
//! let planner = RotationPlanner::new(&store, &layout, &policy, &SystemClock);
//! let report = planner.run(&dumper)?;
//! println!("{}", report.summary());
//! ```

mod evaluator;
mod identity;
mod layout;
mod planner;
mod policy;
mod template;

pub use evaluator::{within_window, Decision, KeepReason, RetentionEvaluator};
pub use identity::BackupIdentity;
pub use layout::{format_fragment, KeyLayout};
pub use planner::{PlannedBackup, PurgeFailure, RotationPlan, RotationPlanner, RunReport, StoredBackup};
pub use policy::{AnchoredTier, RetentionPolicy, Tier, TierKind};
pub use template::{KeyMatcher, PathTemplate, DATE, TIME};
