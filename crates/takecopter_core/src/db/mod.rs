//! Embedded SQLite engine and schema management.
//!
//! # Responsibility
//! - Own the in-memory engine and its byte-image import/export.
//! - Declare the relational schema and apply additive migrations.
//!
//! # Invariants
//! - The schema version marker lives in `meta.schema_version` and never decreases.
//! - Application data is not read or written before `ensure_schema` succeeds.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod engine;
pub mod schema;

pub use engine::Engine;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// Scratch-file I/O while moving a database image in or out of the engine.
    Image(std::io::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Image(err) => write!(f, "database image transfer failed: {err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Image(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Image(value)
    }
}
