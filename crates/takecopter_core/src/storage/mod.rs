//! Durable storage for the engine's byte image.
//!
//! # Responsibility
//! - Provide key-value tiers that store opaque byte blobs.
//! - Combine a primary and a secondary tier into one fallback policy.
//!
//! # Invariants
//! - Storage has no knowledge of SQL; it only moves bytes.
//! - A write is only reported as failed when every tier rejected it.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod file_store;
mod memory_store;
mod tiered;

pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use tiered::{
    FilePersistenceProvider, MemoryPersistenceProvider, PersistenceProvider, TierFailure,
    TieredPersistence,
};

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    Io {
        store: &'static str,
        key: String,
        source: std::io::Error,
    },
    /// The tier refused to serve requests at all.
    Unavailable { store: &'static str, reason: String },
    InvalidKey(String),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { store, key, source } => {
                write!(f, "{store} store failed on `{key}`: {source}")
            }
            Self::Unavailable { store, reason } => {
                write!(f, "{store} store unavailable: {reason}")
            }
            Self::InvalidKey(key) => write!(f, "invalid storage key `{key}`"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Unavailable { .. } => None,
            Self::InvalidKey(_) => None,
        }
    }
}

/// One durable storage tier addressed by string keys.
pub trait KeyValueStore: Send {
    /// Short label used in logs and errors.
    fn label(&self) -> &'static str;
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;
    fn put(&self, key: &str, bytes: &[u8]) -> StorageResult<()>;
    /// Removing an absent key succeeds.
    fn remove(&self, key: &str) -> StorageResult<()>;
}
