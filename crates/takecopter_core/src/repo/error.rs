use crate::codec::CodecError;
use crate::db::DbError;
use crate::storage::TierFailure;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type RepoResult<T> = Result<T, RepoError>;

/// Every failure the repository contract can surface.
#[derive(Debug)]
pub enum RepoError {
    /// No project root has been initialized or opened yet.
    SetupRequired,
    EmptyPath,
    EmptyTitle,
    /// Referenced story id does not exist.
    NotFound(String),
    RootNotFound(PathBuf),
    /// Directory holds neither a database image nor a legacy manifest.
    NotAProject(PathBuf),
    InvalidSource(String),
    VersionTooNew { found: i64, supported: i64 },
    /// A statement inside a mutation failed; the mutation was rolled back.
    TransactionFailed(DbError),
    /// Both storage tiers rejected the flush. In-memory state is kept.
    PersistenceUnavailable(TierFailure),
    Db(DbError),
    /// Reading or writing an export, import or backup file failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Config(String),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetupRequired => write!(f, "no project root configured; initialize or open one first"),
            Self::EmptyPath => write!(f, "project root path must not be empty"),
            Self::EmptyTitle => write!(f, "story title must not be empty"),
            Self::NotFound(id) => write!(f, "story not found: {id}"),
            Self::RootNotFound(path) => {
                write!(f, "project root does not exist: {}", path.display())
            }
            Self::NotAProject(path) => {
                write!(f, "directory is not a takecopter project: {}", path.display())
            }
            Self::InvalidSource(reason) => write!(f, "invalid import source: {reason}"),
            Self::VersionTooNew { found, supported } => write!(
                f,
                "data uses schema version {found}, newer than supported {supported}; upgrade the application first"
            ),
            Self::TransactionFailed(err) => write!(f, "transaction rolled back: {err}"),
            Self::PersistenceUnavailable(err) => {
                write!(f, "no storage tier could serve the project image ({err})")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Config(message) => write!(f, "configuration error: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TransactionFailed(err) => Some(err),
            Self::PersistenceUnavailable(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<TierFailure> for RepoError {
    fn from(value: TierFailure) -> Self {
        Self::PersistenceUnavailable(value)
    }
}

impl From<CodecError> for RepoError {
    fn from(value: CodecError) -> Self {
        match value {
            CodecError::InvalidSource(reason) => Self::InvalidSource(reason),
            CodecError::VersionTooNew { found, supported } => {
                Self::VersionTooNew { found, supported }
            }
        }
    }
}
