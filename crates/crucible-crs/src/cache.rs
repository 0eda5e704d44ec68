//! The client-side CRS cache: lifecycle operations over
//! `crucible-metadata.db` plus the `pkgs/` content store (spec §3.4, §4.C).

use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use rusqlite::{params, Connection, OptionalExtension};

use crucible_foundation::{NameBuf, PkgId, StagingDir, Version};
use crucible_metadata::PackageMetadata;

use crate::db;
use crate::error::{Error, Result};
use crate::sync::{self, SyncPolicy};

/// A package entry visible through the currently-enabled remotes, ordered
/// by remote enablement order then descending revision (the solver's
/// tie-break rule, spec §4.D).
#[derive(Debug, Clone)]
pub struct EnabledPackage {
    pub id: PkgId,
    pub remote_id: i64,
    pub metadata: PackageMetadata,
}

pub struct CrsCache {
    root: PathBuf,
    conn: Connection,
    client: Client,
}

impl CrsCache {
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        std::fs::create_dir_all(root.join("pkgs"))?;
        let conn = db::open(&root.join("crucible-metadata.db"))?;
        Ok(Self {
            root: root.to_owned(),
            conn,
            client: Client::builder().build().expect("default TLS config is valid"),
        })
    }

    /// Synchronizes `url`, per the algorithm in SPEC_FULL §4.C.
    pub fn sync_remote(&mut self, url: &str, policy: SyncPolicy) -> Result<()> {
        sync::sync_remote(&mut self.conn, &self.client, url, policy)
    }

    /// `enable_remote(url)`: must already have been synced at least once.
    pub fn enable_remote(&mut self, url: &str) -> Result<()> {
        let remote_id: Option<i64> = self
            .conn
            .query_row("SELECT remote_id FROM remotes WHERE url = ?1", params![url], |row| {
                row.get(0)
            })
            .optional()?;
        let remote_id = remote_id.ok_or_else(|| Error::NoSuchRemoteUrl(url.to_owned()))?;
        self.conn.execute(
            "INSERT OR IGNORE INTO enabled_remotes (remote_id) VALUES (?1)",
            params![remote_id],
        )?;
        Ok(())
    }

    /// All package rows visible through enabled remotes matching `name`,
    /// optionally narrowed to a single `version`. Ordered by remote
    /// enablement order, then descending version, then descending revision.
    pub fn enabled_packages(&self, name: &NameBuf, version: Option<&Version>) -> Result<Vec<EnabledPackage>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.name, p.version, p.revision, p.remote_id, p.json
             FROM packages p
             JOIN enabled_remotes e ON e.remote_id = p.remote_id
             WHERE p.name = ?1
             ORDER BY e.rowid ASC, p.revision DESC",
        )?;
        let rows = stmt
            .query_map(params![name.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut out = Vec::new();
        for (name_str, version_str, revision, remote_id, json) in rows {
            if let Some(want) = version {
                if version_str != want.to_string() {
                    continue;
                }
            }
            let parsed_version = Version::parse(&version_str).map_err(crucible_metadata::Error::from)?;
            let id = PkgId::new(NameBuf::new(&name_str)?, parsed_version, revision);
            let value: serde_json::Value =
                serde_json::from_str(&json).map_err(crucible_metadata::Error::from)?;
            let metadata = PackageMetadata::from_json(&value)?;
            out.push(EnabledPackage {
                id,
                remote_id,
                metadata,
            });
        }
        // version descending within the already remote-ordered groups
        out.sort_by(|a, b| b.id.version.cmp(&a.id.version).then(b.id.revision.cmp(&a.id.revision)));
        Ok(out)
    }

    /// Distinct package names visible through any enabled remote, for
    /// `pkg search`'s glob matching (SPEC_FULL §9.1).
    pub fn all_enabled_names(&self) -> Result<Vec<NameBuf>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT p.name
             FROM packages p
             JOIN enabled_remotes e ON e.remote_id = p.remote_id
             ORDER BY p.name ASC",
        )?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|n| NameBuf::new(&n).map_err(crucible_metadata::Error::from).map_err(Error::from))
            .collect()
    }

    fn owning_remote_url(&self, remote_id: i64) -> Result<String> {
        Ok(self
            .conn
            .query_row("SELECT url FROM remotes WHERE remote_id = ?1", params![remote_id], |row| {
                row.get(0)
            })?)
    }

    /// Prefetches `id` (revision `0` resolved to the highest available for
    /// `id`'s version), returning the path to its materialized source
    /// directory.
    pub fn prefetch(&self, id: &PkgId) -> Result<PathBuf> {
        let candidates = self.enabled_packages(&id.name, Some(&id.version))?;
        let chosen = if id.revision == 0 {
            candidates.iter().max_by_key(|c| c.id.revision)
        } else {
            candidates.iter().find(|c| c.id.revision == id.revision)
        }
        .ok_or_else(|| Error::NoSuchPkg(id.clone()))?;

        let resolved_id = PkgId::new(id.name.clone(), chosen.id.version.clone(), chosen.id.revision);
        let dest = self.pkg_dir(&resolved_id);
        if dest.exists() {
            return Ok(dest);
        }

        let url = self.owning_remote_url(chosen.remote_id)?;
        let tarball = self.fetch_tarball(&url, &resolved_id)?;
        self.expand_tarball(&tarball, &resolved_id)
    }

    fn pkg_dir(&self, id: &PkgId) -> PathBuf {
        self.root.join("pkgs").join(id.to_string())
    }

    fn fetch_tarball(&self, remote_url: &str, id: &PkgId) -> Result<Vec<u8>> {
        let parsed = url::Url::parse(remote_url)?;
        let subpath = format!("pkg/{}/{}~{}/pkg.tgz", id.name, id.version, id.revision);
        if parsed.scheme() == "file" {
            let base = parsed
                .to_file_path()
                .map_err(|_| Error::HttpError {
                    url: remote_url.to_owned(),
                    status: 0,
                    status_message: "invalid file:// URL".into(),
                })?;
            Ok(std::fs::read(base.join(subpath))?)
        } else {
            let full_url = format!("{}/{subpath}", remote_url.trim_end_matches('/'));
            let response = self
                .client
                .get(&full_url)
                .send()
                .map_err(|source| Error::Network {
                    url: full_url.clone(),
                    source,
                })?;
            if !response.status().is_success() {
                return Err(Error::HttpError {
                    url: full_url,
                    status: response.status().as_u16(),
                    status_message: response
                        .status()
                        .canonical_reason()
                        .unwrap_or("unknown")
                        .to_owned(),
                });
            }
            Ok(response
                .bytes()
                .map_err(|source| Error::Network {
                    url: full_url,
                    source,
                })?
                .to_vec())
        }
    }

    fn expand_tarball(&self, bytes: &[u8], id: &PkgId) -> Result<PathBuf> {
        let decoder = flate2::read::GzDecoder::new(bytes);
        let mut archive = tar::Archive::new(decoder);
        let staging = StagingDir::new_in(&self.root.join("pkgs"))?;
        archive.unpack(staging.path())?;
        let dest = self.pkg_dir(id);
        staging.publish(&dest)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_foundation::{IfExists, NameBuf};
    use serde_json::json;

    fn write_sdist(dir: &Path, name: &str, version: &str, revision: u32) {
        std::fs::create_dir_all(dir.join("lib/core/src")).unwrap();
        std::fs::write(dir.join("lib/core/src/a.cpp"), "int main(){}").unwrap();
        let manifest = json!({
            "schema-version": 1,
            "id": {"name": name, "version": version, "revision": revision},
            "libraries": [{
                "name": name,
                "path": "lib/core",
                "intra_using": [],
                "intra_test_using": [],
                "dependencies": [],
                "test_dependencies": []
            }]
        });
        std::fs::write(dir.join("pkg.json"), serde_json::to_string(&manifest).unwrap()).unwrap();
    }

    #[test]
    fn sync_enable_prefetch_round_trip_over_file_remote() {
        let repo_dir = tempfile::tempdir().unwrap();
        let mut repo = crucible_storage::Repository::create(repo_dir.path(), "origin").unwrap();
        let sdist = tempfile::tempdir().unwrap();
        write_sdist(sdist.path(), "fmt", "9.1.0", 1);
        let id = repo.import_dir(sdist.path(), IfExists::Fail).unwrap();

        let cache_dir = tempfile::tempdir().unwrap();
        let mut cache = CrsCache::open(cache_dir.path()).unwrap();
        let remote_url = url::Url::from_file_path(repo_dir.path()).unwrap().to_string();

        cache.sync_remote(&remote_url, SyncPolicy::Always).unwrap();
        cache.enable_remote(&remote_url).unwrap();

        let found = cache
            .enabled_packages(&NameBuf::new("fmt").unwrap(), None)
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, id);

        let materialized = cache.prefetch(&id).unwrap();
        assert!(materialized.join("lib/core/src/a.cpp").exists());
        assert!(materialized.join("pkg.json").exists());

        // a second prefetch is a no-op that returns the same path without refetching
        let again = cache.prefetch(&id).unwrap();
        assert_eq!(again, materialized);
    }

    #[test]
    fn enable_unsynced_remote_fails() {
        let cache_dir = tempfile::tempdir().unwrap();
        let mut cache = CrsCache::open(cache_dir.path()).unwrap();
        let err = cache.enable_remote("https://example.invalid/repo").unwrap_err();
        assert!(matches!(err, Error::NoSuchRemoteUrl(_)));
    }
}
