//! Directory-backed tier: one file per key.

use super::{KeyValueStore, StorageError, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct FileStore {
    dir: PathBuf,
    label: &'static str,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, label: &'static str) -> Self {
        Self {
            dir: dir.into(),
            label,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\'])
            && key != "..";
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(key))
    }

    fn io_error(&self, key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            store: self.label,
            key: key.to_string(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn label(&self) -> &'static str {
        self.label
    }

    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(key, err)),
        }
    }

    /// Writes to a sibling temp file first, then renames over the target.
    fn put(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|err| self.io_error(key, err))?;
        let staging = self.dir.join(format!(".{key}.tmp"));
        fs::write(&staging, bytes).map_err(|err| self.io_error(key, err))?;
        fs::rename(&staging, &path).map_err(|err| {
            let _ = fs::remove_file(&staging);
            self.io_error(key, err)
        })
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(key, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FileStore;
    use crate::storage::{KeyValueStore, StorageError};

    #[test]
    fn put_get_remove_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"), "primary");

        assert_eq!(store.get("db").unwrap(), None);
        store.put("db", b"first").unwrap();
        store.put("db", b"second").unwrap();
        assert_eq!(store.get("db").unwrap().as_deref(), Some(&b"second"[..]));

        store.remove("db").unwrap();
        store.remove("db").unwrap();
        assert_eq!(store.get("db").unwrap(), None);
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), "primary");
        assert!(matches!(
            store.put("../escape", b"x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StorageError::InvalidKey(_))));
    }
}
