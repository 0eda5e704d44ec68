//! Forward-only SQLite schema migrations for `repo.db` (spec §3.3, §4.B).

use rusqlite::{Connection, Transaction};

use crate::error::{Error, Result};

/// Each entry is applied, in order, inside its own transaction, bumping
/// `user_version` by one. Migrations are never edited once released; new
/// schema changes are appended.
const MIGRATIONS: &[&str] = &[
    // v1: packages + self-identification
    r#"
    CREATE TABLE packages (
        name TEXT NOT NULL,
        version TEXT NOT NULL,
        revision INTEGER NOT NULL,
        json TEXT NOT NULL,
        PRIMARY KEY (name, version, revision)
    );
    CREATE TABLE self (
        name TEXT NOT NULL
    );
    "#,
];

pub fn known_version() -> i64 {
    MIGRATIONS.len() as i64
}

pub fn apply(conn: &mut Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > known_version() {
        return Err(Error::DbMigrationTooNew {
            found: current,
            known: known_version(),
        });
    }
    for (i, migration) in MIGRATIONS.iter().enumerate().skip(current as usize) {
        let version = (i + 1) as i64;
        let tx: Transaction = conn.transaction()?;
        tx.execute_batch(migration)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        tracing::debug!(version, "applied repository migration");
    }
    Ok(())
}
