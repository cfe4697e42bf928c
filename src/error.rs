//! Custom error types for spindb
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions. Failures that a run is expected to absorb
//! (keys that are not backups, individual purge failures) are not errors and
//! never appear here.

use thiserror::Error;

/// The main error type for spindb operations
#[derive(Error, Debug)]
pub enum SpinError {
    /// Invalid or incomplete configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local file I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// An object store call failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The database dump failed
    #[error("Dump error: {0}")]
    Dump(String),

    /// The backup inventory could not be listed, so the run cannot proceed
    #[error("Listing failed: {0}")]
    Listing(String),

    /// Today's backup could not be created; nothing was deleted
    #[error("Failed to create backup {key}: {reason}")]
    Creation { key: String, reason: String },
}

impl SpinError {
    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Name of the run phase this error aborted, if it is a fatal run error
    pub fn phase(&self) -> Option<&'static str> {
        match self {
            Self::Listing(_) => Some("listing"),
            Self::Creation { .. } => Some("creation"),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SpinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias for spindb operations
pub type SpinResult<T> = Result<T, SpinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpinError::Config("template is missing {date}".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: template is missing {date}"
        );
        assert!(err.is_config());
    }

    #[test]
    fn test_creation_error() {
        let err = SpinError::Creation {
            key: "site.com/db_2024-03-15.sql".into(),
            reason: "mysqldump exited with status 2".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to create backup site.com/db_2024-03-15.sql: mysqldump exited with status 2"
        );
        assert_eq!(err.phase(), Some("creation"));
    }

    #[test]
    fn test_phase() {
        assert_eq!(SpinError::Listing("denied".into()).phase(), Some("listing"));
        assert_eq!(SpinError::Storage("denied".into()).phase(), None);
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let spin_err: SpinError = io_err.into();
        assert!(matches!(spin_err, SpinError::Io(_)));
    }
}
