//! Directory-backed object store

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::ObjectStore;
use crate::error::{SpinError, SpinResult};

/// Suffix of partially written objects; never reported by `list`
const PART_SUFFIX: &str = ".spindb-part";

/// A bucket stored as a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Create a store rooted at the bucket directory `root`
    ///
    /// The directory is created lazily on the first upload.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the bucket directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for `key`, rejecting keys that would escape the bucket
    fn object_path(&self, key: &str) -> SpinResult<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(SpinError::Storage(format!("Invalid object key: '{}'", key)));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> SpinResult<()> {
        let entries = fs::read_dir(dir).map_err(|e| {
            SpinError::Storage(format!("Failed to read {}: {}", dir.display(), e))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                SpinError::Storage(format!("Failed to read directory entry: {}", e))
            })?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| {
                SpinError::Storage(format!("Failed to stat {}: {}", path.display(), e))
            })?;

            if file_type.is_dir() {
                self.collect_keys(&path, keys)?;
            } else if let Some(key) = self.key_of(&path) {
                keys.push(key);
            }
        }

        Ok(())
    }

    fn key_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        let key = segments.join("/");
        (!key.ends_with(PART_SUFFIX)).then_some(key)
    }

    /// Remove directories left empty by a delete, stopping at the bucket root
    fn prune_empty_parents(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root || !current.starts_with(&self.root) {
                break;
            }
            // Fails harmlessly when the directory still has entries
            if fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

impl ObjectStore for LocalObjectStore {
    fn list(&self, prefix: &str) -> SpinResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys)?;
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();

        debug!(prefix, count = keys.len(), "listed objects");
        Ok(keys)
    }

    fn put(&self, key: &str, local_path: &Path) -> SpinResult<()> {
        let target = self.object_path(key)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SpinError::Storage(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        // Copy next to the target, then rename, so a failed upload never
        // leaves a truncated object under the real key
        let mut part_name = target.as_os_str().to_owned();
        part_name.push(PART_SUFFIX);
        let part_path = PathBuf::from(part_name);

        let copy = || -> io::Result<()> {
            let mut reader = BufReader::new(File::open(local_path)?);
            let mut writer = BufWriter::new(File::create(&part_path)?);
            io::copy(&mut reader, &mut writer)?;
            writer.flush()?;
            writer.get_ref().sync_all()
        };

        if let Err(e) = copy() {
            let _ = fs::remove_file(&part_path);
            return Err(SpinError::Storage(format!(
                "Failed to upload {} to {}: {}",
                local_path.display(),
                key,
                e
            )));
        }

        fs::rename(&part_path, &target).map_err(|e| {
            let _ = fs::remove_file(&part_path);
            SpinError::Storage(format!("Failed to store {}: {}", key, e))
        })?;

        debug!(key, "stored object");
        Ok(())
    }

    fn delete(&self, key: &str) -> SpinResult<()> {
        let path = self.object_path(key)?;

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(SpinError::Storage(format!("Failed to delete {}: {}", key, e)));
            }
        }

        self.prune_empty_parents(&path);
        debug!(key, "deleted object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (LocalObjectStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path().join("bucket"));
        (store, temp_dir)
    }

    fn source_file(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("source.sql");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_empty_bucket() {
        let (store, _temp) = create_test_store();
        assert!(store.list("").unwrap().is_empty());
    }

    #[test]
    fn test_put_and_list() {
        let (store, temp) = create_test_store();
        let source = source_file(&temp, "-- dump");

        store.put("site.com/db_2024-03-15.sql", &source).unwrap();
        store.put("site.com/db_2024-03-14.sql", &source).unwrap();
        store.put("other/readme.txt", &source).unwrap();

        assert_eq!(
            store.list("site.com").unwrap(),
            vec!["site.com/db_2024-03-14.sql", "site.com/db_2024-03-15.sql"]
        );
        assert_eq!(store.list("").unwrap().len(), 3);

        let stored = fs::read_to_string(store.root().join("site.com/db_2024-03-15.sql")).unwrap();
        assert_eq!(stored, "-- dump");
    }

    #[test]
    fn test_put_replaces_existing() {
        let (store, temp) = create_test_store();
        let source = source_file(&temp, "first");
        store.put("db_2024-03-15.sql", &source).unwrap();

        let source = source_file(&temp, "second");
        store.put("db_2024-03-15.sql", &source).unwrap();

        let stored = fs::read_to_string(store.root().join("db_2024-03-15.sql")).unwrap();
        assert_eq!(stored, "second");
    }

    #[test]
    fn test_put_missing_source_fails_cleanly() {
        let (store, temp) = create_test_store();
        let missing = temp.path().join("missing.sql");

        let err = store.put("site.com/db_2024-03-15.sql", &missing).unwrap_err();
        assert!(matches!(err, SpinError::Storage(_)));
        assert!(store.list("").unwrap().is_empty());
    }

    #[test]
    fn test_delete_prunes_empty_directories() {
        let (store, temp) = create_test_store();
        let source = source_file(&temp, "-- dump");

        store.put("site.com/2024-03-15/db.sql", &source).unwrap();
        store.delete("site.com/2024-03-15/db.sql").unwrap();

        assert!(store.list("").unwrap().is_empty());
        assert!(!store.root().join("site.com").exists());
        assert!(store.root().exists());
    }

    #[test]
    fn test_delete_missing_key_succeeds() {
        let (store, _temp) = create_test_store();
        store.delete("site.com/db_2000-01-01.sql").unwrap();
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let (store, temp) = create_test_store();
        let source = source_file(&temp, "-- dump");

        for key in ["", "/abs.sql", "a//b.sql", "../escape.sql", "a/./b.sql"] {
            assert!(store.put(key, &source).is_err(), "{} should be rejected", key);
        }
    }
}
