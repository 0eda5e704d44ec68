//! `pkg create|prefetch|solve|search` (SPEC_FULL §6.1, §9.1).

use std::fs::File;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use flate2::write::GzEncoder;
use flate2::Compression;
use glob::Pattern;

use crucible_foundation::{IfExists, PkgId};

use crate::cli::{GlobalArgs, Run};
use crate::cmd::common;
use crate::error::{CliError, Result};
use crate::project;

#[derive(Args)]
pub struct PkgCmd {
    #[command(subcommand)]
    command: PkgSubcommand,
}

#[derive(Subcommand)]
enum PkgSubcommand {
    Create(CreateCmd),
    Prefetch(PrefetchCmd),
    Solve(SolveCmd),
    Search(SearchCmd),
}

impl Run for PkgCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        match &self.command {
            PkgSubcommand::Create(cmd) => cmd.run(global),
            PkgSubcommand::Prefetch(cmd) => cmd.run(global),
            PkgSubcommand::Solve(cmd) => cmd.run(global),
            PkgSubcommand::Search(cmd) => cmd.run(global),
        }
    }
}

#[derive(Args, Debug)]
pub struct CreateCmd {
    #[arg(long, default_value = ".")]
    pub project: PathBuf,
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    #[arg(long)]
    pub revision: Option<u32>,
}

impl Run for CreateCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let mut metadata = project::load_project_manifest(&self.project)?;
        if let Some(revision) = self.revision {
            metadata.id.revision = revision;
        }

        let dest = self.out.join(format!("{}.tar.gz", metadata.id));
        if dest.exists() {
            match global.if_exists.unwrap_or_default() {
                IfExists::Fail => {
                    return Err(CliError::UserError(format!("{} already exists", dest.display())))
                }
                IfExists::Ignore => return Ok(0),
                IfExists::Replace => std::fs::remove_file(&dest)?,
            }
        }

        std::fs::create_dir_all(&self.out)?;
        let file = File::create(&dest)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let canonical_json = metadata.to_canonical_string();
        let manifest_path = self.project.join(".pkg-create-staged.json");
        std::fs::write(&manifest_path, &canonical_json)?;
        builder.append_path_with_name(&manifest_path, "pkg.json")?;
        std::fs::remove_file(&manifest_path)?;
        for lib in &metadata.libraries {
            let lib_dir = self.project.join(&lib.path);
            if lib_dir.exists() {
                builder.append_dir_all(&lib.path, &lib_dir)?;
            }
        }
        builder.finish()?;
        println!("{}", dest.display());
        Ok(0)
    }
}

#[derive(Args, Debug)]
pub struct PrefetchCmd {
    #[arg(required = true)]
    pub ids: Vec<String>,
}

impl Run for PrefetchCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let mut cache = common::open_cache(global)?;
        common::enable_repos(&mut cache, &[], false, crucible_crs::SyncPolicy::CachedOkay)?;
        for raw in &self.ids {
            let parsed = PkgId::parse(raw).map_err(|e| CliError::UserError(e.to_string()))?;
            let path = cache.prefetch(&parsed)?;
            println!("{} -> {}", parsed, path.display());
        }
        Ok(0)
    }
}

#[derive(Args, Debug)]
pub struct SolveCmd {
    #[arg(long = "use-repo")]
    pub use_repo: Vec<String>,
    #[arg(long)]
    pub no_default_repo: bool,
    #[arg(required = true)]
    pub shorthands: Vec<String>,
}

impl Run for SolveCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let dependencies = self
            .shorthands
            .iter()
            .map(|s| common::shorthand_to_dependency(s))
            .collect::<Result<Vec<_>>>()?;

        let mut cache = common::open_cache(global)?;
        common::enable_repos(&mut cache, &self.use_repo, self.no_default_repo, crucible_crs::SyncPolicy::CachedOkay)?;

        let solution = crucible_solve::solve(&cache, &dependencies, &[], false)?;
        for resolved in &solution.packages {
            println!("{}", resolved.id);
        }
        Ok(0)
    }
}

#[derive(Args, Debug)]
pub struct SearchCmd {
    pub glob: String,
}

impl Run for SearchCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let mut cache = common::open_cache(global)?;
        common::enable_repos(&mut cache, &[], false, crucible_crs::SyncPolicy::CachedOkay)?;

        let pattern = Pattern::new(&self.glob).map_err(|e| CliError::UserError(e.to_string()))?;
        for name in cache.all_enabled_names()? {
            if pattern.matches(name.as_str()) {
                println!("{name}");
            }
        }
        Ok(0)
    }
}

