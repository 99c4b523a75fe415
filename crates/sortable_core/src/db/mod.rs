//! SQLite bootstrap for the sortable record table.
//!
//! # Responsibility
//! - Open connections and bring `sortable_records` to the latest schema.
//! - Expose the applied schema version to record stores.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A record store is only built over a connection at `latest_version()`.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Connection bootstrap and schema errors.
#[derive(Debug)]
pub enum DbError {
    /// Connection-level SQLite failure.
    Sqlite(rusqlite::Error),
    /// File was written by a newer binary.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// One migration step failed; the whole batch was rolled back.
    MigrationFailed {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "sortable schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::MigrationFailed {
                version,
                name,
                source,
            } => write!(f, "schema migration {version} `{name}` failed: {source}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::MigrationFailed { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Reads the schema version recorded on the connection.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
