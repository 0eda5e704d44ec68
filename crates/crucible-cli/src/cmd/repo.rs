//! `repo init|import|ls|remove|validate` (SPEC_FULL §6.1, §3.3, §4.B).

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crucible_foundation::{IfExists, PkgId};
use crucible_storage::Repository;

use crate::cli::{GlobalArgs, Run};
use crate::cmd::common;
use crate::error::{CliError, Result};

#[derive(Args)]
pub struct RepoCmd {
    #[command(subcommand)]
    command: RepoSubcommand,
}

#[derive(Subcommand)]
enum RepoSubcommand {
    Init(InitCmd),
    Import(ImportCmd),
    Ls(LsCmd),
    Remove(RemoveCmd),
    Validate(ValidateCmd),
}

impl Run for RepoCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        match &self.command {
            RepoSubcommand::Init(cmd) => cmd.run(global),
            RepoSubcommand::Import(cmd) => cmd.run(global),
            RepoSubcommand::Ls(cmd) => cmd.run(global),
            RepoSubcommand::Remove(cmd) => cmd.run(global),
            RepoSubcommand::Validate(cmd) => cmd.run(global),
        }
    }
}

#[derive(Args, Debug)]
pub struct InitCmd {
    pub dir: PathBuf,
    #[arg(long)]
    pub name: Option<String>,
}

impl Run for InitCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let name = self
            .name
            .clone()
            .or_else(|| self.dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            .ok_or_else(|| CliError::UserError("cannot infer repository name from path".into()))?;

        match Repository::create(&self.dir, &name) {
            Ok(_) => Ok(0),
            Err(crucible_storage::Error::RepoAlreadyInit(path)) => match global.if_exists.unwrap_or_default() {
                IfExists::Fail => Err(crucible_storage::Error::RepoAlreadyInit(path).into()),
                IfExists::Ignore => Ok(0),
                IfExists::Replace => {
                    std::fs::remove_dir_all(&self.dir)?;
                    Repository::create(&self.dir, &name)?;
                    Ok(0)
                }
            },
            Err(other) => Err(other.into()),
        }
    }
}

#[derive(Args, Debug)]
pub struct ImportCmd {
    pub repo_dir: PathBuf,
    #[arg(required = true)]
    pub sdist_dirs: Vec<PathBuf>,
}

impl Run for ImportCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let mut repo = Repository::open_existing(&self.repo_dir)?;
        for dir in &self.sdist_dirs {
            let id = repo.import_dir(dir, global.if_exists.unwrap_or_default())?;
            println!("{id}");
        }
        Ok(0)
    }
}

#[derive(Args, Debug)]
pub struct LsCmd {
    pub repo_dir: PathBuf,
}

impl Run for LsCmd {
    fn run(&self, _global: &GlobalArgs) -> Result<i32> {
        let repo = Repository::open_existing(&self.repo_dir)?;
        for pkg in repo.all_packages()? {
            println!("{}", pkg.id);
        }
        Ok(0)
    }
}

#[derive(Args, Debug)]
pub struct RemoveCmd {
    pub repo_dir: PathBuf,
    #[arg(required = true)]
    pub ids: Vec<String>,
}

impl Run for RemoveCmd {
    fn run(&self, _global: &GlobalArgs) -> Result<i32> {
        let mut repo = Repository::open_existing(&self.repo_dir)?;
        for raw in &self.ids {
            let id = PkgId::parse(raw).map_err(|e| CliError::UserError(e.to_string()))?;
            repo.remove_pkg(&id)?;
        }
        Ok(0)
    }
}

#[derive(Args, Debug)]
pub struct ValidateCmd {
    pub repo_dir: PathBuf,
    #[arg(long = "use-repo")]
    pub use_repo: Vec<String>,
}

impl Run for ValidateCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let repo = Repository::open_existing(&self.repo_dir)?;
        let mut cache = common::open_cache(global)?;
        common::enable_repos(&mut cache, &self.use_repo, false, crucible_crs::SyncPolicy::CachedOkay)?;

        let mut unresolved = Vec::new();
        for pkg in repo.all_packages()? {
            let mut dependencies = Vec::new();
            for lib in &pkg.libraries {
                dependencies.extend(lib.dependencies.iter().cloned());
            }
            if let Err(err) = crucible_solve::solve(&cache, &dependencies, &[], false) {
                unresolved.push((pkg.id.clone(), err));
            }
        }

        for (id, err) in &unresolved {
            eprintln!("{id}: {err}");
        }
        if unresolved.is_empty() {
            Ok(0)
        } else {
            Ok(1)
        }
    }
}
