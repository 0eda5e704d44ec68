//! Command-line driver: parses the CLI, loads config/toolchain/project
//! state, and dispatches into the core build engine (SPEC_FULL §6).

pub mod cli;
pub mod cmd;
pub mod error;
pub mod project;

pub use cli::{GlobalArgs, Opt, Run};
pub use error::CliError;
