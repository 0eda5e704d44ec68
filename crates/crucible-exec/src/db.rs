//! `.crucible.db` build database (spec §3.6, §4.H).

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS compilations (
    output_path TEXT PRIMARY KEY,
    command_hash TEXT NOT NULL,
    inputs_hash TEXT NOT NULL,
    deps_list TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS build_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const CACHE_BUSTER_KEY: &str = "tweaks_dir_digest";

/// A compile node is stale if either hash in its row differs from what
/// the current invocation computed.
pub struct Fingerprint {
    pub command_hash: String,
    pub inputs_hash: String,
    pub deps_list: Vec<String>,
}

/// Opens `.crucible.db`, taking an exclusive lock for the build's
/// lifetime (spec §5 "the build DB is single-process").
pub struct BuildDatabase {
    conn: Mutex<Connection>,
}

impl BuildDatabase {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "locking_mode", "EXCLUSIVE")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Returns `true` if the tweaks-dir layout changed since the last
    /// build, clearing every compilation row so the next rebuild is
    /// forced to re-check everything (spec §4.H).
    pub fn apply_cache_buster(&self, digest: u64) -> Result<bool> {
        let digest = digest.to_string();
        let conn = self.conn.lock().unwrap();
        let prior: Option<String> = conn
            .query_row(
                "SELECT value FROM build_meta WHERE key = ?1",
                params![CACHE_BUSTER_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let changed = prior.as_deref() != Some(digest.as_str());
        if changed {
            conn.execute("DELETE FROM compilations", [])?;
            conn.execute(
                "INSERT INTO build_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![CACHE_BUSTER_KEY, digest],
            )?;
        }
        Ok(changed)
    }

    pub fn lookup(&self, output_path: &str) -> Result<Option<Fingerprint>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT command_hash, inputs_hash, deps_list FROM compilations WHERE output_path = ?1",
                params![output_path],
                |row| {
                    let deps: String = row.get(2)?;
                    Ok(Fingerprint {
                        command_hash: row.get(0)?,
                        inputs_hash: row.get(1)?,
                        deps_list: deps.split('\n').filter(|s| !s.is_empty()).map(str::to_owned).collect(),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Serializes writes through the single mutex held only for the
    /// duration of this call (spec §4.G "Ordering guarantees").
    pub fn record(&self, output_path: &str, command_hash: &str, inputs_hash: &str, deps_list: &[String]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO compilations (output_path, command_hash, inputs_hash, deps_list)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(output_path) DO UPDATE SET
                command_hash = excluded.command_hash,
                inputs_hash = excluded.inputs_hash,
                deps_list = excluded.deps_list",
            params![output_path, command_hash, inputs_hash, deps_list.join("\n")],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_buster_clears_rows_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let db = BuildDatabase::open(&dir.path().join(".crucible.db")).unwrap();
        db.record("out.o", "cmd1", "in1", &["h.h".to_string()]).unwrap();
        assert!(db.lookup("out.o").unwrap().is_some());

        assert!(db.apply_cache_buster(42).unwrap(), "first call always changes");
        assert!(db.lookup("out.o").unwrap().is_none());

        db.record("out.o", "cmd1", "in1", &["h.h".to_string()]).unwrap();
        assert!(!db.apply_cache_buster(42).unwrap(), "same digest is stable");
        assert!(db.lookup("out.o").unwrap().is_some());

        assert!(db.apply_cache_buster(43).unwrap());
        assert!(db.lookup("out.o").unwrap().is_none());
    }

    #[test]
    fn lookup_roundtrips_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let db = BuildDatabase::open(&dir.path().join(".crucible.db")).unwrap();
        db.record("a.o", "cmd", "inputs", &["a.h".into(), "b.h".into()]).unwrap();
        let fp = db.lookup("a.o").unwrap().unwrap();
        assert_eq!(fp.command_hash, "cmd");
        assert_eq!(fp.deps_list, vec!["a.h".to_string(), "b.h".to_string()]);
    }
}
