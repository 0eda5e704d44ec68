//! `crucible-metadata.db` schema (spec §3.4).

use rusqlite::Connection;

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS remotes (
    remote_id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    unique_name TEXT NOT NULL,
    revno INTEGER NOT NULL DEFAULT 0,
    etag TEXT,
    last_modified TEXT,
    resource_time INTEGER,
    cache_control TEXT
);

CREATE TABLE IF NOT EXISTS packages (
    remote_id INTEGER NOT NULL REFERENCES remotes(remote_id),
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    revision INTEGER NOT NULL,
    remote_revno INTEGER NOT NULL,
    json TEXT NOT NULL,
    PRIMARY KEY (name, version, revision, remote_id)
);

-- session-scoped: cleared and repopulated by `enable_remote`, not persisted
-- across process invocations.
CREATE TEMP TABLE IF NOT EXISTS enabled_remotes (
    remote_id INTEGER PRIMARY KEY
);
"#;

pub fn open(path: &std::path::Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}
