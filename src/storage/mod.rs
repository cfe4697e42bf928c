//! Object storage for backups
//!
//! The rotation core talks to storage only through [`ObjectStore`]: list the
//! keys under a prefix, upload a local file under a key, delete a key. Listings
//! may contain anything; the caller decides which keys are backups.
//!
//! [`LocalObjectStore`] keeps a bucket as a directory tree, with each key's `/`
//! separated segments mapped to nested directories.

mod local;

pub use local::LocalObjectStore;

use std::path::Path;

use crate::error::SpinResult;

/// Minimal object store contract used by the rotation planner
///
/// Retry and timeout behaviour belongs to implementations. Every failure must
/// be reported as an error rather than swallowed.
pub trait ObjectStore {
    /// All keys starting with `prefix`, in lexical order
    fn list(&self, prefix: &str) -> SpinResult<Vec<String>>;

    /// Upload the file at `local_path` under `key`, replacing any existing object
    fn put(&self, key: &str, local_path: &Path) -> SpinResult<()>;

    /// Delete `key`; deleting a missing key succeeds
    fn delete(&self, key: &str) -> SpinResult<()>;
}
