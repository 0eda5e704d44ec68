//! Server-side repository: a named on-disk store of published package
//! archives plus a SQLite metadata index (spec §3.3, §4.B).

mod error;
mod migrations;
mod repository;

pub use error::{Error, Result};
pub use repository::Repository;
