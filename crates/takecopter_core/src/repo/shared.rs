//! Thread-safe handle for hosts that call the repository from several threads.

use super::{ProjectDataRepository, RepoResult};
use std::sync::{Arc, Mutex, PoisonError};

/// Cloneable handle; each call holds the lock for one whole mutation
/// (normalize, transaction and persist), so calls never interleave.
pub struct SharedProjectRepository<R> {
    inner: Arc<Mutex<R>>,
}

impl<R> Clone for SharedProjectRepository<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: ProjectDataRepository> SharedProjectRepository<R> {
    pub fn new(repo: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(repo)),
        }
    }

    /// Runs `op` with exclusive access to the repository.
    ///
    /// A poisoned lock is recovered: a panicking holder dropped its open
    /// transaction, which rolled the engine back.
    pub fn with<T>(&self, op: impl FnOnce(&mut R) -> RepoResult<T>) -> RepoResult<T> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        op(&mut guard)
    }
}
