//! Schema declaration and additive migrations.
//!
//! # Responsibility
//! - Create the base tables when absent.
//! - Add columns introduced after the first release, then backfill them.
//! - Raise `meta.schema_version` to [`CURRENT_SCHEMA_VERSION`].
//!
//! # Invariants
//! - Every step is safe to run on every startup; there is no destructive DDL.
//! - Only the "duplicate column" failure of `ADD COLUMN` is tolerated. Any
//!   other DDL error is returned, since it means the schema is corrupt.
//! - The stored version is never lowered, even by an older binary.

use crate::db::DbResult;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};

/// Schema version written by this binary.
pub const CURRENT_SCHEMA_VERSION: i64 = 3;

pub const SCHEMA_VERSION_KEY: &str = "schema_version";

const BASE_TABLES_SQL: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT
);
CREATE TABLE IF NOT EXISTS stories (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    updated_at TEXT NOT NULL DEFAULT '',
    cover_color TEXT
);
CREATE TABLE IF NOT EXISTS workspaces (
    story_id TEXT PRIMARY KEY REFERENCES stories(id) ON DELETE CASCADE,
    settings_json TEXT NOT NULL DEFAULT '[]',
    tree_json TEXT NOT NULL DEFAULT '[]',
    library_json TEXT
);
";

#[derive(Debug, Clone, Copy)]
struct ColumnMigration {
    /// Schema version that introduced the column.
    version: i64,
    table: &'static str,
    column: &'static str,
    decl: &'static str,
    backfill_sql: &'static str,
}

const COLUMN_MIGRATIONS: &[ColumnMigration] = &[
    ColumnMigration {
        version: 2,
        table: "workspaces",
        column: "library_json",
        decl: "TEXT",
        backfill_sql: "UPDATE workspaces
             SET library_json = '{\"tags\":[],\"categories\":[],\"templates\":[]}'
             WHERE library_json IS NULL OR TRIM(library_json) = '';",
    },
    ColumnMigration {
        version: 3,
        table: "stories",
        column: "cover_color",
        decl: "TEXT",
        backfill_sql: "UPDATE stories
             SET cover_color = 'var(--coral-400)'
             WHERE cover_color IS NULL OR TRIM(cover_color) = '';",
    },
];

/// Outcome of one `ensure_schema` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaReport {
    /// Version found in `meta` before this run (0 when absent).
    pub previous_version: i64,
    /// Version stored after this run.
    pub version: i64,
}

impl SchemaReport {
    pub fn changed(&self) -> bool {
        self.previous_version != self.version
    }
}

/// Creates, migrates and stamps the schema in one transaction.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<SchemaReport> {
    let tx = conn.transaction()?;
    tx.execute_batch(BASE_TABLES_SQL)?;

    for migration in COLUMN_MIGRATIONS {
        if add_column_if_missing(&tx, migration.table, migration.column, migration.decl)? {
            info!(
                "event=schema_migrate module=db status=ok version={} table={} column={}",
                migration.version, migration.table, migration.column
            );
        }
        tx.execute_batch(migration.backfill_sql)?;
    }

    let previous_version = stored_version(&tx)?;
    let version = if previous_version < CURRENT_SCHEMA_VERSION {
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string()],
        )?;
        CURRENT_SCHEMA_VERSION
    } else {
        if previous_version > CURRENT_SCHEMA_VERSION {
            warn!(
                "event=schema_version module=db status=newer stored={} supported={}",
                previous_version, CURRENT_SCHEMA_VERSION
            );
        }
        previous_version
    };
    tx.commit()?;

    Ok(SchemaReport {
        previous_version,
        version,
    })
}

/// Reads `meta.schema_version`; absent or unparsable values count as 0.
pub fn stored_version(conn: &Connection) -> DbResult<i64> {
    let raw: Option<Option<String>> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1;",
            [SCHEMA_VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw
        .flatten()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(0))
}

/// Returns `true` when the column was added, `false` when it already existed.
fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> DbResult<bool> {
    let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl};");
    match conn.execute(&sql, []) {
        Ok(_) => Ok(true),
        Err(err) if is_duplicate_column(&err) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            message.contains("duplicate column name")
        }
        _ => false,
    }
}
