//! `build` and `compile-file` (SPEC_FULL §6.1): load config/toolchain/
//! project, resolve dependencies, construct the build plan, run it.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use colored::Colorize;
use crucible_build::{BuildPlan, PlanOptions};
use crucible_crs::SyncPolicy;
use crucible_exec::{BuildDatabase, ExecOptions, RunReport, Scheduler};

use crate::cli::{GlobalArgs, Run};
use crate::cmd::common;
use crate::error::{CliError, Result};
use crate::project;

#[derive(Args, Debug)]
pub struct BuildCmd {
    /// Path to the toolchain description; defaults to config/env.
    #[arg(long)]
    pub toolchain: Option<PathBuf>,
    /// Project directory; defaults to the current directory.
    #[arg(long, default_value = ".")]
    pub project: PathBuf,
    #[arg(long)]
    pub no_tests: bool,
    #[arg(long)]
    pub no_apps: bool,
    #[arg(long)]
    pub no_warnings: bool,
    #[arg(long)]
    pub out: Option<PathBuf>,
    #[arg(long, default_value_t = 0, env = "CRUCIBLE_JOBS")]
    pub jobs: usize,
    #[arg(long)]
    pub tweaks_dir: Option<PathBuf>,
    #[arg(long = "use-repo")]
    pub use_repo: Vec<String>,
    #[arg(long, env = "CRUCIBLE_NO_DEFAULT_REPO")]
    pub no_default_repo: bool,
    #[arg(long, default_value = "cached-okay")]
    pub repo_sync: String,
}

impl BuildCmd {
    fn sync_policy(&self) -> Result<SyncPolicy> {
        match self.repo_sync.as_str() {
            "always" => Ok(SyncPolicy::Always),
            "cached-okay" => Ok(SyncPolicy::CachedOkay),
            "never" => Ok(SyncPolicy::Never),
            other => Err(CliError::UserError(format!(
                "invalid --repo-sync value `{other}`: expected always, cached-okay, or never"
            ))),
        }
    }

    fn run_plan(&self, plan: &BuildPlan, out_dir: &std::path::Path) -> Result<RunReport> {
        let db = Arc::new(BuildDatabase::open(&out_dir.join(".crucible.db"))?);
        let cancel = Arc::new(AtomicBool::new(false));
        let ctrlc_cancel = Arc::clone(&cancel);
        let _ = ctrlc::set_handler(move || {
            ctrlc_cancel.store(true, std::sync::atomic::Ordering::SeqCst);
        });
        let opts = ExecOptions {
            out_dir: out_dir.to_owned(),
            jobs: self.jobs,
            tweaks_dir: self.tweaks_dir.clone(),
        };
        let scheduler = Scheduler::new(plan, db, opts, cancel);
        Ok(scheduler.run()?)
    }

    fn build_plan(&self, global: &GlobalArgs) -> Result<(BuildPlan, PathBuf)> {
        let toolchain = project::load_toolchain(self.toolchain.as_deref())?;
        let manifest = project::load_project_manifest(&self.project)?;

        let mut cache = common::open_cache(global)?;
        let build_tests = !self.no_tests;
        common::enable_repos(&mut cache, &self.use_repo, self.no_default_repo, self.sync_policy()?)?;
        let packages = common::activate_packages(&cache, &self.project, &manifest, build_tests)?;

        let out_dir = self.out.clone().unwrap_or_else(|| common::default_out_dir(&self.project));
        let plan_opts = PlanOptions {
            build_tests,
            build_apps: !self.no_apps,
            warnings: !self.no_warnings,
            out_dir: out_dir.clone(),
            tweaks_dir: self.tweaks_dir.clone(),
            test_timeout: Some(Duration::from_secs(300)),
        };
        let plan = BuildPlan::build(&toolchain, &packages, &plan_opts)?;
        Ok((plan, out_dir))
    }
}

impl Run for BuildCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let (plan, out_dir) = self.build_plan(global)?;
        // Scheduler::run() already rolls a failing RunReport up into an
        // Err (spec §4.G precedence); reaching here means full success.
        let report = self.run_plan(&plan, &out_dir)?;
        print_report(&report);
        Ok(0)
    }
}

#[derive(Args, Debug)]
pub struct CompileFileCmd {
    #[command(flatten)]
    pub build: BuildCmd,
    /// Only compile nodes whose source matches one of these paths.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl Run for CompileFileCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let (plan, out_dir) = self.build.build_plan(global)?;
        let wanted: Vec<PathBuf> = self
            .files
            .iter()
            .map(|f| std::fs::canonicalize(f).unwrap_or_else(|_| f.clone()))
            .collect();

        let mut filtered = plan.graph.clone();
        let mut keep = std::collections::HashSet::new();
        for idx in &plan.compiles {
            if let crucible_build::BuildNode::Compile(node) = &plan.graph[*idx] {
                let canonical = std::fs::canonicalize(&node.source).unwrap_or_else(|_| node.source.clone());
                if wanted.iter().any(|w| *w == canonical) {
                    keep.insert(*idx);
                }
            }
        }
        filtered.retain_nodes(|_, idx| keep.contains(&idx));

        let reduced = BuildPlan {
            graph: filtered,
            compiles: keep.into_iter().collect(),
            archives: Vec::new(),
            links: Vec::new(),
            tests: Vec::new(),
            requirements: plan.requirements,
        };

        let report = self.build.run_plan(&reduced, &out_dir)?;
        print_report(&report);
        Ok(0)
    }
}

fn print_report(report: &RunReport) {
    println!(
        "compiled {} skipped {} archived {} linked {} blocked {}",
        report.compiled, report.skipped, report.archived, report.linked, report.blocked
    );
    for failure in &report.compile_failures {
        eprintln!("{}", failure.to_string().red());
    }
    for failure in &report.link_failures {
        eprintln!("{}", failure.to_string().red());
    }
    for outcome in report.test_failures() {
        eprintln!("{}", format!("test failed: {}", outcome.name).red());
    }
}
