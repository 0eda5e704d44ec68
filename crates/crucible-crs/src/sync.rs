//! Remote synchronization algorithm (spec §4.C).

use std::io::Read;

use chrono::Utc;
use reqwest::blocking::Client;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::http::{self, FetchOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    Always,
    CachedOkay,
    Never,
}

struct PriorRemote {
    remote_id: i64,
    etag: Option<String>,
    last_modified: Option<String>,
    resource_time: Option<i64>,
    cache_control: Option<String>,
}

fn load_prior(conn: &Connection, url: &str) -> Result<Option<PriorRemote>> {
    conn.query_row(
        "SELECT remote_id, etag, last_modified, resource_time, cache_control FROM remotes WHERE url = ?1",
        params![url],
        |row| {
            Ok(PriorRemote {
                remote_id: row.get(0)?,
                etag: row.get(1)?,
                last_modified: row.get(2)?,
                resource_time: row.get(3)?,
                cache_control: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(Error::from)
}

/// Runs the sync algorithm for `url` against `conn`, honoring `policy` on
/// failure. Returns `Ok(())` whether or not new data was actually fetched.
pub fn sync_remote(conn: &mut Connection, client: &Client, url: &str, policy: SyncPolicy) -> Result<()> {
    if policy == SyncPolicy::Never {
        return Ok(());
    }

    match sync_remote_inner(conn, client, url) {
        Ok(()) => Ok(()),
        Err(err) => match policy {
            SyncPolicy::Always => Err(err),
            SyncPolicy::CachedOkay => {
                if load_prior(conn, url)?.is_some() {
                    tracing::warn!(%url, error = %err, "sync failed, continuing with cached data");
                    Ok(())
                } else {
                    Err(err)
                }
            }
            SyncPolicy::Never => unreachable!(),
        },
    }
}

fn sync_remote_inner(conn: &mut Connection, client: &Client, url: &str) -> Result<()> {
    let parsed = url::Url::parse(url)?;

    if parsed.scheme() == "file" {
        return sync_file_remote(conn, url, &parsed);
    }

    let prior = load_prior(conn, url)?;

    if let Some(prior) = &prior {
        if let (Some(cache_control), Some(resource_time)) = (&prior.cache_control, prior.resource_time) {
            if let Some(max_age) = http::max_age_seconds(cache_control) {
                if resource_time + max_age > Utc::now().timestamp() {
                    conn.execute(
                        "UPDATE remotes SET resource_time = ?1 WHERE remote_id = ?2",
                        params![Utc::now().timestamp(), prior.remote_id],
                    )?;
                    return Ok(());
                }
            }
        }
    }

    let fetch_url = format!("{}/repo.db.gz", url.trim_end_matches('/'));
    let outcome = http::conditional_get(
        client,
        &fetch_url,
        prior.as_ref().and_then(|p| p.etag.as_deref()),
        prior.as_ref().and_then(|p| p.last_modified.as_deref()),
    )?;

    match outcome {
        FetchOutcome::NotModified {
            etag,
            last_modified,
            cache_control,
        } => {
            let prior = prior.expect("304 implies a prior row");
            conn.execute(
                "UPDATE remotes SET etag = ?1, last_modified = ?2, resource_time = ?3, cache_control = ?4 WHERE remote_id = ?5",
                params![
                    etag.or(prior.etag),
                    last_modified.or(prior.last_modified),
                    Utc::now().timestamp(),
                    cache_control.or(prior.cache_control),
                    prior.remote_id,
                ],
            )?;
            Ok(())
        }
        FetchOutcome::Fetched {
            body,
            etag,
            last_modified,
            cache_control,
        } => ingest_remote_db(conn, url, &body, etag, last_modified, cache_control),
    }
}

fn sync_file_remote(conn: &mut Connection, url: &str, parsed: &url::Url) -> Result<()> {
    let path = parsed
        .to_file_path()
        .map_err(|_| Error::HttpError {
            url: url.to_owned(),
            status: 0,
            status_message: "invalid file:// URL".into(),
        })?
        .join("repo.db");
    let bytes = std::fs::read(&path)?;
    ingest_remote_db(conn, url, &bytes, None, None, None)
}

/// Shared ingestion for both the `file://` direct-open path and the
/// downloaded-and-decompressed HTTP path: attaches the remote database,
/// upserts `remotes`/`packages` inside one transaction, prunes stale rows,
/// and runs an integrity check.
fn ingest_remote_db(
    conn: &mut Connection,
    url: &str,
    raw_bytes: &[u8],
    etag: Option<String>,
    last_modified: Option<String>,
    cache_control: Option<String>,
) -> Result<()> {
    let decompressed = maybe_gunzip(raw_bytes)?;
    let temp = tempfile::NamedTempFile::new()?;
    std::fs::write(temp.path(), &decompressed)?;

    let remote_name: String = {
        let remote_conn = Connection::open(temp.path())?;
        remote_conn.query_row("SELECT name FROM self LIMIT 1", [], |row| row.get(0))?
    };

    let tx = conn.transaction()?;
    tx.execute("ATTACH DATABASE ?1 AS remote", params![temp.path().to_string_lossy()])?;

    let prior_revno: Option<i64> = tx
        .query_row(
            "SELECT revno FROM remotes WHERE unique_name = ?1",
            params![remote_name],
            |row| row.get(0),
        )
        .optional()?;
    let new_revno = prior_revno.unwrap_or(0) + 1;

    tx.execute(
        "INSERT INTO remotes (url, unique_name, revno, etag, last_modified, resource_time, cache_control)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(url) DO UPDATE SET
            unique_name = excluded.unique_name,
            revno = excluded.revno,
            etag = excluded.etag,
            last_modified = excluded.last_modified,
            resource_time = excluded.resource_time,
            cache_control = excluded.cache_control",
        params![
            url,
            remote_name,
            new_revno,
            etag,
            last_modified,
            Utc::now().timestamp(),
            cache_control,
        ],
    )?;
    let remote_id: i64 = tx.query_row(
        "SELECT remote_id FROM remotes WHERE url = ?1",
        params![url],
        |row| row.get(0),
    )?;

    {
        let mut stmt = tx.prepare("SELECT name, version, revision, json FROM remote.packages")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let version: String = row.get(1)?;
            let revision: i64 = row.get(2)?;
            let json: String = row.get(3)?;

            let parsed: serde_json::Value = match serde_json::from_str(&json) {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(%name, %version, revision, error = %err, "skipping invalid package row during sync");
                    continue;
                }
            };
            if let Err(err) = crucible_metadata::PackageMetadata::from_json(&parsed) {
                tracing::warn!(%name, %version, revision, error = %err, "skipping invalid package row during sync");
                continue;
            }

            tx.execute(
                "INSERT INTO packages (remote_id, name, version, revision, remote_revno, json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(name, version, revision, remote_id) DO UPDATE SET
                    remote_revno = excluded.remote_revno, json = excluded.json",
                params![remote_id, name, version, revision, new_revno, json],
            )?;
        }
    }

    tx.execute(
        "DELETE FROM packages WHERE remote_id = ?1 AND remote_revno < ?2",
        params![remote_id, new_revno],
    )?;

    tx.execute("DETACH DATABASE remote", [])?;
    tx.pragma_query(None, "integrity_check", |_| Ok(()))?;
    tx.commit()?;
    Ok(())
}

fn maybe_gunzip(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut decoder = flate2::read::GzDecoder::new(bytes);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|_| Error::Decompression("repo.db.gz".into()))?;
        Ok(out)
    } else {
        Ok(bytes.to_vec())
    }
}
