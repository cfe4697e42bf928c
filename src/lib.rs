//! spindb - dated database snapshots with grandfather-father-son rotation
//!
//! Each run dumps the database once per day into an object store under a key
//! built from a path template, then deletes the backups the retention policy no
//! longer wants. Today's backup is always written before anything is deleted.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Path resolution, settings and environment overrides
//! - `error`: Custom error types
//! - `rotation`: Key templates, retention policy and the rotation planner
//! - `storage`: Object store contract and the directory-backed store
//! - `dump`: Database dump commands and compression
//! - `clock`: Injectable source of "now"
//! - `health`: Backup freshness check
//! - `cli`: Command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use spindb::config::{paths::SpinPaths, settings::Settings};
//!
//! let paths = SpinPaths::new()?;
//! let mut settings = Settings::load_or_default(&paths.settings_file())?;
//! settings.apply_process_env()?;
//! let config = settings.validate(&paths)?;
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod dump;
pub mod error;
pub mod health;
pub mod rotation;
pub mod storage;

pub use error::SpinError;
