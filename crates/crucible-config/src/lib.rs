//! Layered configuration loader: defaults, system/user config files, and
//! `CRUCIBLE_*` environment variables, exposed as a process-wide singleton
//! (§1.1, §6.3).

mod config;
mod error;

pub use error::{Error, Result};

pub use self::config::*;
