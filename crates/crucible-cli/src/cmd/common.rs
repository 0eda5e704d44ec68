//! Shared wiring between CLI subcommands: config/project loading, remote
//! enablement, and dependency resolution → activated-package lists.

use std::path::{Path, PathBuf};

use crucible_build::ActivatedPackage;
use crucible_crs::{CrsCache, SyncPolicy};
use crucible_foundation::{NameBuf, PkgId};
use crucible_metadata::{Dependency, DependencyShorthand, PackageMetadata};
use crucible_solve::Solution;

use crate::cli::GlobalArgs;
use crate::error::Result;

/// No explicit upper bound exists in the shorthand grammar (no `*`/"any"
/// literal in `VersionRangeSet::parse`), so a bare `name` shorthand is
/// widened to this range rather than left unconstrained.
const UNCONSTRAINED_RANGE: &str = ">=0.0.0,<100000.0.0";

pub fn open_cache(global: &GlobalArgs) -> Result<CrsCache> {
    Ok(CrsCache::open(&global.crs_cache_dir()?)?)
}

/// Syncs and enables every `--use-repo` url, plus the default repo unless
/// `no_default_repo` is set (SPEC_FULL §6.1, §6.3).
pub fn enable_repos(
    cache: &mut CrsCache,
    use_repo: &[String],
    no_default_repo: bool,
    sync: SyncPolicy,
) -> Result<()> {
    let mut urls: Vec<String> = use_repo.to_vec();
    if !no_default_repo {
        let config = crucible_config::Config::current()?;
        if !config.no_default_repo {
            urls.push(config.default_repo_url.clone());
        }
    }
    for url in &urls {
        tracing::info!(%url, "syncing remote");
        cache.sync_remote(url, sync)?;
        cache.enable_remote(url)?;
    }
    Ok(())
}

pub fn shorthand_to_dependency(shorthand: &str) -> Result<Dependency> {
    let parsed = DependencyShorthand::parse(shorthand)?;
    let acceptable_versions = match &parsed.version_range {
        Some(range) => crucible_foundation::VersionRangeSet::parse(range).map_err(crucible_metadata::Error::from)?,
        None => crucible_foundation::VersionRangeSet::parse(UNCONSTRAINED_RANGE)
            .map_err(crucible_metadata::Error::from)?,
    };
    let uses = parsed
        .uses
        .iter()
        .map(|n| NameBuf::new(n))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(crucible_metadata::Error::from)?;
    Ok(Dependency {
        name: NameBuf::new(&parsed.name).map_err(crucible_metadata::Error::from)?,
        acceptable_versions,
        uses,
    })
}

/// Resolves `manifest`'s own dependency edges against `cache`'s enabled
/// remotes, prefetches every resolved package's sources, and returns the
/// full activated-package list (root package first) ready for
/// `crucible_build::BuildPlan::build` (SPEC_FULL §4.C, §4.D, §4.F).
pub fn activate_packages(
    cache: &CrsCache,
    project_dir: &Path,
    manifest: &PackageMetadata,
    build_tests: bool,
) -> Result<Vec<ActivatedPackage>> {
    let mut dependencies = Vec::new();
    let mut test_dependencies = Vec::new();
    for lib in &manifest.libraries {
        dependencies.extend(lib.dependencies.iter().cloned());
        test_dependencies.extend(lib.test_dependencies.iter().cloned());
    }

    let solution: Solution = crucible_solve::solve(cache, &dependencies, &test_dependencies, build_tests)?;

    let mut packages = vec![ActivatedPackage {
        name: manifest.id.name.clone(),
        id: None,
        libraries: manifest.libraries.clone(),
        source_root: project_dir.to_owned(),
        needed_libs: manifest.libraries.iter().map(|l| l.name.clone()).collect(),
    }];

    for resolved in &solution.packages {
        tracing::info!(id = %resolved.id, "activating resolved package");
        packages.push(activate_resolved(cache, &resolved.id, resolved.needed_libs.clone())?);
    }
    Ok(packages)
}

fn activate_resolved(
    cache: &CrsCache,
    id: &PkgId,
    needed_libs: std::collections::BTreeSet<NameBuf>,
) -> Result<ActivatedPackage> {
    let source_root = cache.prefetch(id)?;
    let raw = std::fs::read_to_string(source_root.join("pkg.json"))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let metadata = PackageMetadata::from_json(&value)?;
    Ok(ActivatedPackage {
        name: id.name.clone(),
        id: Some(id.clone()),
        libraries: metadata.libraries,
        source_root,
        needed_libs,
    })
}

pub fn default_out_dir(project_dir: &Path) -> PathBuf {
    project_dir.join("out")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_shorthand_widens_to_sentinel_range() {
        let dep = shorthand_to_dependency("fmt").unwrap();
        assert_eq!(dep.name.as_str(), "fmt");
        assert!(dep.acceptable_versions.contains(&"0.1.0".parse().unwrap()));
        assert!(dep.acceptable_versions.contains(&"99999.0.0".parse().unwrap()));
        assert!(dep.uses.is_empty());
    }

    #[test]
    fn shorthand_with_range_and_uses() {
        let dep = shorthand_to_dependency("fmt@^9.0.0+fmt,fmt-test").unwrap();
        assert_eq!(dep.name.as_str(), "fmt");
        assert!(dep.acceptable_versions.contains(&"9.1.0".parse().unwrap()));
        assert!(!dep.acceptable_versions.contains(&"10.0.0".parse().unwrap()));
        assert_eq!(dep.uses.iter().map(|n| n.as_str()).collect::<Vec<_>>(), vec!["fmt", "fmt-test"]);
    }

    #[test]
    fn rejects_malformed_shorthand() {
        assert!(shorthand_to_dependency("-fmt@^9.0.0").is_err());
    }
}
