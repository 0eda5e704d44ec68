//! CLI-boundary error wrapper: renders through `miette`, and writes the
//! stable error marker string to a side-channel file for test oracles
//! (§4.J, §7).

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Diagnostic, Debug, Error)]
#[diagnostic(
    url(
        "https://crucible.build/error_codes#{}",
        self.error_marker()
    )
)]
pub enum CliError {
    #[error("{0}")]
    UserError(String),

    #[error("project manifest not found: expected one of pkg.json, pkg.yaml, project.json in {0}")]
    MissingProjectManifest(PathBuf),

    #[error("build cancelled")]
    UserCancelled,

    #[error(transparent)]
    Config(#[from] crucible_config::Error),
    #[error(transparent)]
    Metadata(#[from] crucible_metadata::Error),
    #[error(transparent)]
    Storage(#[from] crucible_storage::Error),
    #[error(transparent)]
    Crs(#[from] crucible_crs::Error),
    #[error(transparent)]
    Solve(#[from] crucible_solve::Error),
    #[error(transparent)]
    Toolchain(#[from] crucible_toolchain::Error),
    #[error(transparent)]
    Build(#[from] crucible_build::Error),
    #[error(transparent)]
    Exec(#[from] crucible_exec::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// The stable string the test suite uses as an oracle of which error
    /// path fired (§4.J).
    pub fn error_marker(&self) -> &'static str {
        match self {
            CliError::UserError(_) => "user-error",
            CliError::MissingProjectManifest(_) => "missing-project-manifest",
            CliError::UserCancelled => "user-cancelled",
            CliError::Config(_) => "config-error",
            CliError::Metadata(_) => "invalid-metadata",
            CliError::Storage(err) => storage_marker(err),
            CliError::Crs(err) => crs_marker(err),
            CliError::Solve(_) => "no-dependency-solution",
            CliError::Toolchain(_) => "invalid-toolchain",
            CliError::Build(_) => "build-plan-error",
            CliError::Exec(err) => exec_marker(err),
            CliError::Json(_) => "invalid-json",
            CliError::Yaml(_) => "invalid-yaml",
            CliError::Io(_) => "io-error",
        }
    }

    /// Maps this error to the process exit code (§6.1): `1` user/environment
    /// error, `2` user cancelled, `42` internal invariant violation.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::UserCancelled | CliError::Exec(crucible_exec::Error::UserCancelled) => 2,
            CliError::Build(crucible_build::Error::UsageCycle(_))
            | CliError::Solve(crucible_solve::Error::Internal(_)) => 42,
            _ => 1,
        }
    }

    /// Writes [`Self::error_marker`] to `path`, the side-channel file named
    /// by `--error-marker-file` / `CRUCIBLE_ERROR_MARKER_FILE` (§4.J).
    pub fn write_marker_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        std::fs::write(path, self.error_marker())
    }
}

fn storage_marker(err: &crucible_storage::Error) -> &'static str {
    match err {
        crucible_storage::Error::RepoAlreadyInit(_) => "repo-already-init",
        crucible_storage::Error::DbMigrationTooNew { .. } => "repo-db-too-new",
        crucible_storage::Error::RepoImportPkgAlreadyPresent(_) => "repo-import-already-present",
        crucible_storage::Error::NotARepository(_) => "not-a-repository",
        crucible_storage::Error::MissingPkgJson(_) => "missing-pkg-json",
        _ => "repo-error",
    }
}

fn crs_marker(err: &crucible_crs::Error) -> &'static str {
    match err {
        crucible_crs::Error::HttpError { status, .. } if *status == 404 => "repo-sync-http-404",
        crucible_crs::Error::HttpError { .. } => "repo-sync-http-error",
        crucible_crs::Error::Network { .. } => "repo-sync-http-error",
        crucible_crs::Error::NoSuchRemoteUrl(_) => "no-such-remote",
        crucible_crs::Error::NoSuchPkg(_) => "no-such-package",
        crucible_crs::Error::Decompression(_) => "repo-sync-decompression-error",
        _ => "crs-error",
    }
}

fn exec_marker(err: &crucible_exec::Error) -> &'static str {
    match err {
        crucible_exec::Error::CompileFailure { .. } => "compile-failed",
        crucible_exec::Error::LinkFailure { .. } => "link-failed",
        crucible_exec::Error::TestFailure { .. } => "test-failed",
        crucible_exec::Error::UserCancelled => "user-cancelled",
        _ => "build-exec-error",
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_cancelled_exits_2_from_either_path() {
        assert_eq!(CliError::UserCancelled.exit_code(), 2);
        assert_eq!(CliError::Exec(crucible_exec::Error::UserCancelled).exit_code(), 2);
    }

    #[test]
    fn usage_cycle_exits_42() {
        let usage = crucible_foundation::Usage::new(
            crucible_foundation::NameBuf::new("fmt").unwrap(),
            crucible_foundation::NameBuf::new("fmt").unwrap(),
        );
        let err = CliError::Build(crucible_build::Error::UsageCycle(usage));
        assert_eq!(err.exit_code(), 42);
    }

    #[test]
    fn default_exit_code_is_1() {
        assert_eq!(CliError::UserError("oops".into()).exit_code(), 1);
    }

    #[test]
    fn marker_file_round_trips_error_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marker");
        let err = CliError::UserCancelled;
        err.write_marker_file(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "user-cancelled");
    }
}
