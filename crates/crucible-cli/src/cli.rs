//! Top-level command-line surface (§6.1). One `Opt` parses global options
//! and dispatches to a `Command` variant; every leaf struct implements
//! [`Run`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::cmd;
use crate::error::Result;

/// Trait every cli command (leaf or group) implements to be runnable.
pub trait Run {
    fn run(&self, global: &GlobalArgs) -> Result<i32>;
}

#[derive(Parser)]
#[command(name = "crucible", version, about = "Build driver and package manager for compiled-source dependency graphs")]
pub struct Opt {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalArgs {
    /// Logging verbosity.
    #[arg(long, global = true, default_value = "info", env = "CRUCIBLE_LOG_LEVEL")]
    pub log_level: String,

    /// Directory for the local CRS cache (defaults to `CRUCIBLE_CRS_CACHE_DIR`
    /// or the platform cache dir).
    #[arg(long, global = true, env = "CRUCIBLE_CRS_CACHE_DIR")]
    pub crs_cache_dir: Option<PathBuf>,

    /// Default conflict policy for commands that can overwrite existing state.
    #[arg(long, global = true)]
    pub if_exists: Option<crucible_foundation::IfExists>,

    /// Default policy for commands that expect state to already exist.
    #[arg(long, global = true)]
    pub if_missing: Option<crucible_foundation::IfMissing>,

    /// Write the stable error marker string here on failure (also settable
    /// via `CRUCIBLE_ERROR_MARKER_FILE`); used as a test oracle (§4.J, §8).
    #[arg(long, global = true, env = "CRUCIBLE_ERROR_MARKER_FILE")]
    pub error_marker_file: Option<PathBuf>,
}

impl GlobalArgs {
    pub fn crs_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.crs_cache_dir {
            return Ok(dir.clone());
        }
        let config = crucible_config::Config::current()?;
        if let Some(dir) = &config.crs_cache_dir {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("crucible"))
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the project in the current working directory.
    Build(cmd::build::BuildCmd),
    /// Compile listed files only.
    CompileFile(cmd::build::CompileFileCmd),
    /// Materialize dependencies and emit index files.
    BuildDeps(cmd::build_deps::BuildDepsCmd),
    /// Package creation, prefetch, solve, and search.
    Pkg(cmd::pkg::PkgCmd),
    /// Repository-level actions and maintenance.
    Repo(cmd::repo::RepoCmd),
    /// Copy or symlink this binary onto PATH.
    InstallYourself(cmd::install_yourself::InstallYourselfCmd),
    /// Scaffold a new project.
    New(cmd::new::NewCmd),
}

impl Run for Command {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        match self {
            Command::Build(cmd) => cmd.run(global),
            Command::CompileFile(cmd) => cmd.run(global),
            Command::BuildDeps(cmd) => cmd.run(global),
            Command::Pkg(cmd) => cmd.run(global),
            Command::Repo(cmd) => cmd.run(global),
            Command::InstallYourself(cmd) => cmd.run(global),
            Command::New(cmd) => cmd.run(global),
        }
    }
}
