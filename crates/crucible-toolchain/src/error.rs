#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{context}: unknown toolchain key `{field}`{}", suggestion.map(|s| format!(" (did you mean `{s}`?)")).unwrap_or_default())]
    UnknownField {
        field: String,
        context: &'static str,
        suggestion: Option<&'static str>,
    },
    #[error("{context}: {message}")]
    InvalidToolchain { context: &'static str, message: String },
    #[error("{context}: cannot deduce `{field}` without a `compiler_id`")]
    MissingCompilerId { context: &'static str, field: &'static str },
    #[error("invalid `compiler_id` value `{0}`, expected one of `msvc`, `gnu`, `clang`")]
    InvalidCompilerId(String),
    #[error("invalid `debug` value `{0}`, expected a bool or one of `none`, `embedded`, `split`")]
    InvalidDebugMode(String),
    #[error("invalid `deps_mode` value `{0}`, expected one of `gnu`, `msvc`, `none`")]
    InvalidDepsMode(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
