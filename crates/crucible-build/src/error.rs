use crucible_foundation::{NameBuf, Usage};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{usage}: `uses` names `{target}`, which is not an activated library")]
    UnresolvedUse { usage: Usage, target: Usage },
    #[error("cycle detected in library `uses` graph, starting from `{0}`")]
    UsageCycle(Usage),
    #[error("package `{0}` was activated but declares no library named in its own metadata")]
    EmptyPackage(NameBuf),
    #[error("failed to scan sources under `{path}`: {source}")]
    SourceScan {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
