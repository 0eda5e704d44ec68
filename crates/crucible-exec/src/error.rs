use std::path::PathBuf;

use crucible_foundation::Trail;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to spawn process for {path}: {source}")]
    ProcessSpawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compile of {output} failed with status {status:?}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    CompileFailure {
        output: PathBuf,
        command: Vec<String>,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("link of {output} failed with status {status:?}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    LinkFailure {
        output: PathBuf,
        command: Vec<String>,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("{} test(s) failed", failures.len())]
    TestFailure { failures: Vec<crate::node::TestOutcome> },

    #[error("build cancelled")]
    UserCancelled,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The stable short string used by the CLI boundary as the test
    /// oracle (spec §4.J).
    pub fn error_marker(&self) -> &'static str {
        match self {
            Error::ProcessSpawn { .. } => "process-spawn-failed",
            Error::CompileFailure { .. } => "compile-failed",
            Error::LinkFailure { .. } => "link-failed",
            Error::TestFailure { .. } => "test-failed",
            Error::UserCancelled => "user-cancelled",
            Error::Sqlite(_) => "build-db-error",
            Error::Io(_) => "io-error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Widens [`Error`] with the accumulated breadcrumb trail, for the CLI
/// boundary to render (spec §4.J).
#[derive(Debug)]
pub struct TracedError {
    pub error: Error,
    pub trail: Trail,
}
