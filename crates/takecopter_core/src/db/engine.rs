//! In-memory SQLite engine with byte-image import/export.
//!
//! # Responsibility
//! - Open the single engine instance the repository owns.
//! - Move complete database images in (`from_image`) and out (`export`).
//!
//! # Invariants
//! - Returned engines have `foreign_keys=ON`.
//! - The engine never touches durable storage itself; images are handed to
//!   the persistence layer as opaque bytes.

use super::{DbError, DbResult};
use log::{error, info, warn};
use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName, Params, Transaction, TransactionBehavior};
use std::time::Instant;

const IMAGE_SCRATCH_FILE: &str = "image.sqlite3";

/// Owned handle to the embedded database.
pub struct Engine {
    conn: Connection,
}

impl Engine {
    /// Opens a fresh, empty engine.
    pub fn open_empty() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn)?;
        info!("event=engine_open module=db status=ok mode=empty");
        Ok(Self { conn })
    }

    /// Opens an engine holding a copy of a previously exported image.
    ///
    /// # Errors
    /// - Fails when `image` is not a SQLite database.
    pub fn from_image(image: &[u8]) -> DbResult<Self> {
        let started_at = Instant::now();
        let scratch = tempfile::tempdir()?;
        let path = scratch.path().join(IMAGE_SCRATCH_FILE);
        std::fs::write(&path, image)?;

        let mut conn = Connection::open_in_memory()?;
        if let Err(err) = conn.restore(DatabaseName::Main, &path, None::<fn(Progress)>) {
            error!(
                "event=engine_open module=db status=error mode=image bytes={} error={}",
                image.len(),
                err
            );
            return Err(err.into());
        }
        configure(&conn)?;
        info!(
            "event=engine_open module=db status=ok mode=image bytes={} duration_ms={}",
            image.len(),
            started_at.elapsed().as_millis()
        );
        Ok(Self { conn })
    }

    /// Serializes the whole database into a byte image.
    pub fn export(&self) -> DbResult<Vec<u8>> {
        let scratch = tempfile::tempdir()?;
        let path = scratch.path().join(IMAGE_SCRATCH_FILE);
        self.conn.backup(DatabaseName::Main, &path, None)?;
        Ok(std::fs::read(&path)?)
    }

    /// Executes one or more statements without parameters.
    pub fn exec(&self, sql: &str) -> DbResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Executes one parameterized statement, returning the changed row count.
    pub fn run<P: Params>(&self, sql: &str, params: P) -> DbResult<usize> {
        Ok(self.conn.execute(sql, params)?)
    }

    /// Runs `body` inside `BEGIN IMMEDIATE … COMMIT`.
    ///
    /// Any error from `body` rolls the transaction back before it is returned,
    /// so the engine is left exactly as it was before the call.
    pub fn transaction<T, E>(
        &mut self,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<DbError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| E::from(DbError::from(err)))?;
        match body(&tx) {
            Ok(value) => {
                tx.commit().map_err(|err| E::from(DbError::from(err)))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=engine_rollback module=db status=error error={}",
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

fn configure(conn: &Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Engine;
    use crate::db::DbError;

    #[test]
    fn image_round_trip_preserves_rows() {
        let engine = Engine::open_empty().unwrap();
        engine
            .exec("CREATE TABLE notes (id TEXT PRIMARY KEY, body TEXT);")
            .unwrap();
        let changed = engine
            .run("INSERT INTO notes (id, body) VALUES (?1, ?2);", ["n1", "hello"])
            .unwrap();
        assert_eq!(changed, 1);

        let image = engine.export().unwrap();
        assert!(!image.is_empty());

        let restored = Engine::from_image(&image).unwrap();
        let body: String = restored
            .conn()
            .query_row("SELECT body FROM notes WHERE id = 'n1';", [], |row| row.get(0))
            .unwrap();
        assert_eq!(body, "hello");
    }

    #[test]
    fn garbage_image_is_rejected() {
        let garbage = vec![7u8; 4096];
        assert!(Engine::from_image(&garbage).is_err());
    }

    #[test]
    fn foreign_keys_are_enabled() {
        let engine = Engine::open_empty().unwrap();
        let enabled: i64 = engine
            .conn()
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn failed_transaction_rolls_back_every_statement() {
        let mut engine = Engine::open_empty().unwrap();
        engine
            .exec("CREATE TABLE notes (id TEXT PRIMARY KEY);")
            .unwrap();

        let result: Result<(), DbError> = engine.transaction(|tx| {
            tx.execute("INSERT INTO notes (id) VALUES ('a');", [])?;
            tx.execute("INSERT INTO notes (id) VALUES ('a');", [])?;
            Ok(())
        });
        assert!(result.is_err());

        let count: i64 = engine
            .conn()
            .query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
