//! `build-deps` (SPEC_FULL §6.1, §6.2): resolve a set of dependency
//! shorthands, prefetch them, and emit `.lml`/`.lmp`/`.lmi` index files
//! describing the result for downstream build systems.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use crucible_crs::SyncPolicy;
use crucible_metadata::Dependency;

use crate::cli::{GlobalArgs, Run};
use crate::cmd::common;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct BuildDepsCmd {
    /// Files of newline-separated dependency shorthands, merged with the
    /// positional shorthands.
    #[arg(long = "deps-file")]
    pub deps_file: Vec<PathBuf>,
    /// Emit a CMake include file alongside the .lml/.lmp/.lmi files.
    #[arg(long)]
    pub cmake: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    #[arg(long = "use-repo")]
    pub use_repo: Vec<String>,
    #[arg(long)]
    pub no_default_repo: bool,
    pub shorthands: Vec<String>,
}

impl Run for BuildDepsCmd {
    fn run(&self, global: &GlobalArgs) -> Result<i32> {
        let mut raw_shorthands = self.shorthands.clone();
        for file in &self.deps_file {
            let contents = std::fs::read_to_string(file)?;
            raw_shorthands.extend(contents.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_owned));
        }

        let dependencies: Vec<Dependency> = raw_shorthands
            .iter()
            .map(|s| common::shorthand_to_dependency(s))
            .collect::<Result<Vec<_>>>()?;

        let mut cache = common::open_cache(global)?;
        common::enable_repos(&mut cache, &self.use_repo, self.no_default_repo, SyncPolicy::CachedOkay)?;

        let solution = crucible_solve::solve(&cache, &dependencies, &[], false)?;

        std::fs::create_dir_all(&self.out)?;
        let mut index = std::fs::File::create(self.out.join("index.lmi"))?;
        writeln!(index, "Type: Index")?;

        for resolved in &solution.packages {
            let source_root = cache.prefetch(&resolved.id)?;
            let raw = std::fs::read_to_string(source_root.join("pkg.json"))?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            let metadata = crucible_metadata::PackageMetadata::from_json(&value)?;

            writeln!(index, "Package: {}", resolved.id.name)?;

            let mut pkg_manifest = std::fs::File::create(self.out.join(format!("{}.lmp", resolved.id.name)))?;
            writeln!(pkg_manifest, "Type: Package")?;
            writeln!(pkg_manifest, "Package: {}", resolved.id.name)?;

            for lib in &metadata.libraries {
                if !resolved.needed_libs.contains(&lib.name) {
                    continue;
                }
                writeln!(pkg_manifest, "Library: {}", lib.name)?;

                let mut lib_manifest = std::fs::File::create(
                    self.out.join(format!("{}-{}.lml", resolved.id.name, lib.name)),
                )?;
                writeln!(lib_manifest, "Type: Library")?;
                writeln!(lib_manifest, "Name: {}", lib.name)?;
                writeln!(lib_manifest, "Namespace: {}", resolved.id.name)?;
                writeln!(lib_manifest, "Path: {}", source_root.join(&lib.path).display())?;
                let uses: Vec<String> = lib.intra_using.iter().map(|n| n.to_string()).collect();
                writeln!(lib_manifest, "Uses: {}", uses.join(","))?;
            }
        }

        if let Some(cmake_path) = &self.cmake {
            let mut cmake = std::fs::File::create(cmake_path)?;
            for resolved in &solution.packages {
                writeln!(
                    cmake,
                    "set({}_VERSION \"{}\")",
                    resolved.id.name.to_string().to_uppercase(),
                    resolved.id.version
                )?;
            }
        }

        Ok(0)
    }
}
