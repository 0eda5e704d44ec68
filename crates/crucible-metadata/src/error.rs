use crucible_foundation::{InvalidNameError, InvalidPkgIdError, InvalidRangeError, InvalidVersionError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{message}")]
    InvalidMetaData { message: String },

    #[error("unknown field `{field}` in {context}{}", suggestion.as_ref().map(|s| format!(" (did you mean `{s}`?)")).unwrap_or_default())]
    UnknownField {
        field: String,
        context: String,
        suggestion: Option<&'static str>,
    },

    #[error("unsupported schema-version {found}, expected 1")]
    UnsupportedSchemaVersion { found: i64 },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Name(#[from] InvalidNameError),

    #[error(transparent)]
    Version(#[from] InvalidVersionError),

    #[error(transparent)]
    Range(#[from] InvalidRangeError),

    #[error(transparent)]
    PkgId(#[from] InvalidPkgIdError),

    #[error("malformed dependency shorthand `{0}`")]
    MalformedShorthand(String),
}

pub type Result<T> = std::result::Result<T, Error>;
