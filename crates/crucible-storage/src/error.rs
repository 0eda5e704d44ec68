use std::path::PathBuf;

use crucible_foundation::PkgId;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("repository at {0} is already initialized")]
    RepoAlreadyInit(PathBuf),

    #[error("repository database migration version {found} is newer than this build supports ({known})")]
    DbMigrationTooNew { found: i64, known: i64 },

    #[error("package {0} is already present in this repository")]
    RepoImportPkgAlreadyPresent(PkgId),

    #[error("{0} does not look like a repository (missing repo.db)")]
    NotARepository(PathBuf),

    #[error("source distribution at {0} is missing pkg.json")]
    MissingPkgJson(PathBuf),

    #[error(transparent)]
    Metadata(#[from] crucible_metadata::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
