use crucible_foundation::PkgId;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("remote `{0}` has never been synced")]
    NoSuchRemoteUrl(String),

    #[error("no package matching {0} is enabled")]
    NoSuchPkg(PkgId),

    #[error("HTTP request to {url} failed with status {status}: {status_message}")]
    HttpError {
        url: String,
        status: u16,
        status_message: String,
    },

    #[error("network error reaching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decompress response from {0}")]
    Decompression(String),

    #[error(transparent)]
    Metadata(#[from] crucible_metadata::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
