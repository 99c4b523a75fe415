//! Schema steps for `sortable_records`.
//!
//! Each step runs inside one transaction together with every other pending
//! step, and bumps `PRAGMA user_version` to its own version.

use crate::db::{schema_version, DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create_sortable_records",
    sql: include_str!("0001_init.sql"),
}];

/// Returns the latest schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

fn pending(current_version: u32) -> impl Iterator<Item = &'static Migration> {
    MIGRATIONS
        .iter()
        .filter(move |migration| migration.version > current_version)
}

/// Brings the connection to `latest_version()`.
///
/// Fails without touching the schema when the file is newer than this binary.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = schema_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }
    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in pending(current_version) {
        let step = tx.execute_batch(migration.sql).and_then(|()| {
            tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
        });
        if let Err(source) = step {
            error!(
                "event=schema_migrate module=db status=error version={} name={} error={}",
                migration.version, migration.name, source
            );
            return Err(DbError::MigrationFailed {
                version: migration.version,
                name: migration.name,
                source,
            });
        }
        info!(
            "event=schema_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;
    Ok(())
}
