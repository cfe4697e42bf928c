//! Configuration module for spindb
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - JSON settings with environment overrides
//! - Validation into the values a run works with

pub mod paths;
pub mod settings;

pub use paths::SpinPaths;
pub use settings::{RuntimeConfig, Settings};
