//! Process-local tier. Clones share the same entries.

use super::{KeyValueStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing: Arc<AtomicBool>,
    failing_reads: Arc<AtomicBool>,
    label: MemoryLabel,
}

#[derive(Clone, Copy)]
struct MemoryLabel(&'static str);

impl Default for MemoryLabel {
    fn default() -> Self {
        Self("memory")
    }
}

impl MemoryStore {
    pub fn new(label: &'static str) -> Self {
        Self {
            label: MemoryLabel(label),
            ..Self::default()
        }
    }

    /// While set, every operation fails with `StorageError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// While set, `get` fails but writes and removals still succeed.
    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    fn check(&self) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                store: self.label.0,
                reason: "store is switched off".to_string(),
            });
        }
        Ok(())
    }

    fn poisoned(&self) -> StorageError {
        StorageError::Unavailable {
            store: self.label.0,
            reason: "entry map lock poisoned".to_string(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn label(&self) -> &'static str {
        self.label.0
    }

    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.check()?;
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                store: self.label.0,
                reason: "reads are switched off".to_string(),
            });
        }
        let entries = self.entries.lock().map_err(|_| self.poisoned())?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        self.check()?;
        let mut entries = self.entries.lock().map_err(|_| self.poisoned())?;
        entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.check()?;
        let mut entries = self.entries.lock().map_err(|_| self.poisoned())?;
        entries.remove(key);
        Ok(())
    }
}
