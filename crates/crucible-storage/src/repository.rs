//! Server-side repository: a named on-disk store of published package
//! archives plus a SQLite metadata index (spec §3.3, §4.B).

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::{params, Connection, OptionalExtension};

use crucible_foundation::{IfExists, PkgId, StagingDir};
use crucible_metadata::PackageMetadata;

use crate::error::{Error, Result};
use crate::migrations;

pub struct Repository {
    root: PathBuf,
    conn: Connection,
}

impl Repository {
    /// `create(dir, name)`: initializes `repo.db` with migrations; writes
    /// the `self` row; fails with `RepoAlreadyInit` if one exists.
    pub fn create(dir: &Path, name: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let db_path = dir.join("repo.db");
        let mut conn = Connection::open(&db_path)?;
        migrations::apply(&mut conn)?;

        let existing: Option<String> = conn
            .query_row("SELECT name FROM self LIMIT 1", [], |row| row.get(0))
            .optional()?;
        if existing.is_some() {
            return Err(Error::RepoAlreadyInit(dir.to_owned()));
        }
        conn.execute("INSERT INTO self (name) VALUES (?1)", params![name])?;

        std::fs::create_dir_all(dir.join("pkg"))?;
        Ok(Self {
            root: dir.to_owned(),
            conn,
        })
    }

    /// `open_existing(dir)`: opens and applies forward migrations.
    pub fn open_existing(dir: &Path) -> Result<Self> {
        let db_path = dir.join("repo.db");
        if !db_path.exists() {
            return Err(Error::NotARepository(dir.to_owned()));
        }
        let mut conn = Connection::open(&db_path)?;
        migrations::apply(&mut conn)?;
        Ok(Self {
            root: dir.to_owned(),
            conn,
        })
    }

    pub fn name(&self) -> Result<String> {
        Ok(self
            .conn
            .query_row("SELECT name FROM self LIMIT 1", [], |row| row.get(0))?)
    }

    fn pkg_dir(&self, id: &PkgId) -> PathBuf {
        self.root
            .join("pkg")
            .join(id.name.to_string())
            .join(format!("{}~{}", id.version, id.revision))
    }

    /// `import_dir(src)`: validates `src/pkg.json`, archives each library's
    /// sources, writes the canonical metadata, and atomically publishes
    /// both under `pkg/<name>/<version>~<revision>/`.
    pub fn import_dir(&mut self, src: &Path, if_exists: IfExists) -> Result<PkgId> {
        let manifest_path = src.join("pkg.json");
        if !manifest_path.exists() {
            return Err(Error::MissingPkgJson(src.to_owned()));
        }
        let raw = std::fs::read_to_string(&manifest_path)?;
        let value: serde_json::Value = serde_json::from_str(&raw).map_err(crucible_metadata::Error::from)?;
        let metadata = PackageMetadata::from_json(&value)?;
        let id = metadata.id.clone();

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM packages WHERE name = ?1 AND version = ?2 AND revision = ?3",
                params![id.name.to_string(), id.version.to_string(), id.revision],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            match if_exists {
                IfExists::Fail => return Err(Error::RepoImportPkgAlreadyPresent(id)),
                IfExists::Ignore => return Ok(id),
                IfExists::Replace => {
                    self.remove_pkg(&id)?;
                }
            }
        }

        let staging = StagingDir::new_in(&self.root.join("pkg"))?;
        for lib in &metadata.libraries {
            let lib_src = src.join(&lib.path);
            let lib_dst = staging.path().join(&lib.path);
            if lib_src.exists() {
                copy_dir(&lib_src, &lib_dst)?;
            }
        }
        let canonical_json = metadata.to_canonical_string();
        std::fs::write(staging.path().join("pkg.json"), &canonical_json)?;

        let tgz_path = staging.path().join("pkg.tgz");
        write_tarball(staging.path(), &tgz_path, &metadata)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO packages (name, version, revision, json) VALUES (?1, ?2, ?3, ?4)",
            params![
                id.name.to_string(),
                id.version.to_string(),
                id.revision,
                canonical_json,
            ],
        )?;
        tx.commit()?;

        let dest = self.pkg_dir(&id);
        staging.publish(&dest)?;

        self.regenerate_gz_artifact()?;
        tracing::info!(pkg_id = %id, "imported package into repository");
        Ok(id)
    }

    /// `remove_pkg(id)`: `revision == 0` removes all revisions of
    /// `(name, version)`.
    pub fn remove_pkg(&mut self, id: &PkgId) -> Result<()> {
        let tx = self.conn.transaction()?;
        let removed: Vec<(String, u32)> = if id.revision == 0 {
            let mut stmt = tx.prepare(
                "SELECT version, revision FROM packages WHERE name = ?1",
            )?;
            let rows = stmt
                .query_map(params![id.name.to_string()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            tx.execute(
                "DELETE FROM packages WHERE name = ?1",
                params![id.name.to_string()],
            )?;
            rows
        } else {
            tx.execute(
                "DELETE FROM packages WHERE name = ?1 AND version = ?2 AND revision = ?3",
                params![id.name.to_string(), id.version.to_string(), id.revision],
            )?;
            vec![(id.version.to_string(), id.revision)]
        };
        tx.commit()?;

        for (version, revision) in removed {
            let dir = self
                .root
                .join("pkg")
                .join(id.name.to_string())
                .join(format!("{version}~{revision}"));
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
            }
        }
        self.regenerate_gz_artifact()?;
        Ok(())
    }

    /// `all_packages()`: lazy cursor over all rows, in insertion order.
    pub fn all_packages(&self) -> Result<Vec<PackageMetadata>> {
        let mut stmt = self
            .conn
            .prepare("SELECT json FROM packages ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|json| {
                let value: serde_json::Value =
                    serde_json::from_str(&json).map_err(crucible_metadata::Error::from)?;
                Ok(PackageMetadata::from_json(&value)?)
            })
            .collect()
    }

    fn regenerate_gz_artifact(&self) -> Result<()> {
        self.conn.execute("VACUUM", [])?;
        let db_path = self.root.join("repo.db");
        let gz_path = self.root.join("repo.db.gz");
        let mut input = File::open(&db_path)?;
        let output = File::create(&gz_path)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        let mut buf = Vec::new();
        input.read_to_end(&mut buf)?;
        encoder.write_all(&buf)?;
        encoder.finish()?;
        Ok(())
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

fn write_tarball(staging_root: &Path, dest: &Path, metadata: &PackageMetadata) -> Result<()> {
    let file = File::create(dest)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_path_with_name(staging_root.join("pkg.json"), "pkg.json")?;
    for lib in &metadata.libraries {
        let lib_dir = staging_root.join(&lib.path);
        if lib_dir.exists() {
            builder.append_dir_all(&lib.path, &lib_dir)?;
        }
    }
    builder.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn create_fails_when_already_initialized() {
        let tmp = tempfile::tempdir().unwrap();
        Repository::create(tmp.path(), "test-repo").unwrap();
        assert!(Repository::create(tmp.path(), "test-repo").is_err());
    }

    #[test]
    fn import_then_duplicate_fails_by_default() {
        let repo_dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::create(repo_dir.path(), "test-repo").unwrap();

        let sdist = tempfile::tempdir().unwrap();
        write_sdist(sdist.path(), "fmt", "9.1.0", 1);

        let id = repo.import_dir(sdist.path(), IfExists::Fail).unwrap();
        assert_eq!(id.to_string(), "fmt@9.1.0~1");
        assert!(repo_dir.path().join("pkg/fmt/9.1.0~1/pkg.tgz").exists());

        let err = repo.import_dir(sdist.path(), IfExists::Fail).unwrap_err();
        assert!(matches!(err, Error::RepoImportPkgAlreadyPresent(_)));
    }

    #[test]
    fn import_replace_overwrites() {
        let repo_dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::create(repo_dir.path(), "test-repo").unwrap();
        let sdist = tempfile::tempdir().unwrap();
        write_sdist(sdist.path(), "fmt", "9.1.0", 1);
        repo.import_dir(sdist.path(), IfExists::Fail).unwrap();
        repo.import_dir(sdist.path(), IfExists::Replace).unwrap();
        assert_eq!(repo.all_packages().unwrap().len(), 1);
    }

    #[test]
    fn remove_pkg_all_revisions() {
        let repo_dir = tempfile::tempdir().unwrap();
        let mut repo = Repository::create(repo_dir.path(), "test-repo").unwrap();
        let sdist1 = tempfile::tempdir().unwrap();
        write_sdist(sdist1.path(), "fmt", "9.1.0", 1);
        repo.import_dir(sdist1.path(), IfExists::Fail).unwrap();
        let sdist2 = tempfile::tempdir().unwrap();
        write_sdist(sdist2.path(), "fmt", "9.2.0", 1);
        repo.import_dir(sdist2.path(), IfExists::Fail).unwrap();

        let zero_revision = PkgId::new(
            crucible_foundation::NameBuf::new("fmt").unwrap(),
            crucible_foundation::Version::parse("9.1.0").unwrap(),
            0,
        );
        repo.remove_pkg(&zero_revision).unwrap();
        let remaining = repo.all_packages().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.version.to_string(), "9.2.0");
    }
}
