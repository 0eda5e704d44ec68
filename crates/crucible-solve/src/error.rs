use crucible_foundation::{NameBuf, PkgId};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no dependency solution exists:\n{explanation}")]
    DependencySolveFailure {
        explanation: String,
        missing: Vec<NameBuf>,
    },
    #[error("{package}: `uses` names library `{lib}`, which does not exist in the resolved package")]
    UsageNoSuchLib { package: PkgId, lib: NameBuf },
    #[error("internal solver invariant violated: {0}")]
    Internal(String),
    #[error(transparent)]
    Metadata(#[from] crucible_metadata::Error),
    #[error(transparent)]
    Crs(#[from] crucible_crs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
