use std::collections::{BTreeSet, HashMap, VecDeque};

use pubgrub::error::PubGrubError;
use pubgrub::report::{DefaultStringReporter, Reporter};
use pubgrub::solver::resolve as pubgrub_resolve;
use pubgrub::version::Version as _;

use crucible_crs::CrsCache;
use crucible_foundation::{NameBuf, PkgId};
use crucible_metadata::{Dependency, PackageMetadata};

use crate::error::{Error, Result};
use crate::package::Pkg;
use crate::provider::CrsProvider;
use crate::version::SolverVersion;

/// One package chosen by the solver, together with the subset of its
/// libraries actually reachable through `uses` edges from the root.
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub id: PkgId,
    pub needed_libs: BTreeSet<NameBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Solution {
    /// Ordered by package name, ascending (pubgrub's result has no inherent
    /// order; this is the deterministic order SPEC_FULL §4.F build-plan
    /// construction relies on).
    pub packages: Vec<ResolvedPackage>,
}

/// Resolves `dependencies` (and, when `build_tests` is set, `test_dependencies`
/// as well) against packages visible through `cache`'s enabled remotes.
pub fn solve(
    cache: &CrsCache,
    dependencies: &[Dependency],
    test_dependencies: &[Dependency],
    build_tests: bool,
) -> Result<Solution> {
    let mut root_edges: Vec<Dependency> = dependencies.to_vec();
    if build_tests {
        root_edges.extend(test_dependencies.iter().cloned());
    }

    let provider = CrsProvider::new(cache, &root_edges);
    let assignment = match pubgrub_resolve(&provider, Pkg::Root, SolverVersion::lowest()) {
        Ok(assignment) => assignment,
        Err(PubGrubError::NoSolution(tree)) => {
            let explanation = DefaultStringReporter::report(&tree);
            let missing = root_edges.iter().map(|d| d.name.clone()).collect();
            return Err(Error::DependencySolveFailure { explanation, missing });
        }
        Err(other) => return Err(Error::Internal(other.to_string())),
    };

    let mut metadata_by_name: HashMap<NameBuf, (PkgId, PackageMetadata)> = HashMap::new();
    for (pkg, version) in &assignment {
        let Pkg::Named(name) = pkg else { continue };
        let candidates = cache.enabled_packages(name, Some(version.version()))?;
        let Some(chosen) = candidates.into_iter().next() else {
            return Err(Error::Internal(format!(
                "{name}: solver assigned a version with no matching enabled package row"
            )));
        };
        metadata_by_name.insert(name.clone(), (chosen.id, chosen.metadata));
    }

    let mut needed: HashMap<NameBuf, BTreeSet<NameBuf>> = HashMap::new();
    let mut worklist: VecDeque<(NameBuf, NameBuf)> = VecDeque::new();
    for dep in &root_edges {
        for lib_name in activated_libs(dep) {
            worklist.push_back((dep.name.clone(), lib_name));
        }
    }

    while let Some((pkg_name, lib_name)) = worklist.pop_front() {
        let Some((pkg_id, metadata)) = metadata_by_name.get(&pkg_name) else {
            return Err(Error::Internal(format!(
                "{pkg_name}: used by `uses` but not present in the solver's assignment"
            )));
        };
        let lib = metadata
            .libraries
            .iter()
            .find(|l| l.name == lib_name)
            .ok_or_else(|| Error::UsageNoSuchLib {
                package: pkg_id.clone(),
                lib: lib_name.clone(),
            })?;

        let first_visit = needed.entry(pkg_name.clone()).or_default().insert(lib_name.clone());
        if !first_visit {
            continue;
        }

        for sibling in &lib.intra_using {
            worklist.push_back((pkg_name.clone(), sibling.clone()));
        }
        if build_tests {
            for sibling in &lib.intra_test_using {
                worklist.push_back((pkg_name.clone(), sibling.clone()));
            }
        }
        for dep in &lib.dependencies {
            for target_lib in activated_libs(dep) {
                worklist.push_back((dep.name.clone(), target_lib));
            }
        }
        if build_tests {
            for dep in &lib.test_dependencies {
                for target_lib in activated_libs(dep) {
                    worklist.push_back((dep.name.clone(), target_lib));
                }
            }
        }
    }

    let mut packages: Vec<ResolvedPackage> = metadata_by_name
        .into_iter()
        .map(|(name, (id, _))| ResolvedPackage {
            needed_libs: needed.remove(&name).unwrap_or_default(),
            id,
        })
        .collect();
    packages.sort_by(|a, b| a.id.name.cmp(&b.id.name));

    Ok(Solution { packages })
}

/// A dependency whose `uses` list is empty activates the single library
/// conventionally named after the package itself (SPEC_FULL §9, open
/// question resolution — see DESIGN.md).
fn activated_libs(dep: &Dependency) -> Vec<NameBuf> {
    if dep.uses.is_empty() {
        vec![dep.name.clone()]
    } else {
        dep.uses.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_foundation::{Interval, Version, VersionRangeSet};
    use serde_json::json;
    use std::path::Path;

    fn write_pkg(dir: &Path, name: &str, version: &str, pkg_deps: serde_json::Value) {
        std::fs::create_dir_all(dir.join("lib/core/src")).unwrap();
        std::fs::write(dir.join("lib/core/src/a.cpp"), "int main(){}").unwrap();
        let manifest = json!({
            "schema-version": 1,
            "id": {"name": name, "version": version, "revision": 1},
            "libraries": [{
                "name": "core",
                "path": "lib/core",
                "intra_using": [],
                "intra_test_using": [],
                "dependencies": pkg_deps,
                "test_dependencies": []
            }]
        });
        std::fs::write(dir.join("pkg.json"), serde_json::to_string(&manifest).unwrap()).unwrap();
    }

    fn make_cache(repo_dir: &Path) -> CrsCache {
        // `into_path` intentionally forgoes cleanup; the directory only
        // needs to outlive this test process.
        let cache_dir = tempfile::tempdir().unwrap().into_path();
        let mut cache = CrsCache::open(&cache_dir).unwrap();
        let remote_url = url::Url::from_file_path(repo_dir).unwrap().to_string();
        cache.sync_remote(&remote_url, crucible_crs::SyncPolicy::Always).unwrap();
        cache.enable_remote(&remote_url).unwrap();
        cache
    }

    fn dep(name: &str, uses: &[&str]) -> Dependency {
        Dependency {
            name: NameBuf::new(name).unwrap(),
            acceptable_versions: VersionRangeSet::single(
                Interval::new(Version::parse("0.0.0").unwrap(), Version::parse("100.0.0").unwrap()).unwrap(),
            ),
            uses: uses.iter().map(|u| NameBuf::new(*u).unwrap()).collect(),
        }
    }

    #[test]
    fn resolves_transitive_dependency_and_needed_libs() {
        let repo_dir = tempfile::tempdir().unwrap();
        let mut repo = crucible_storage::Repository::create(repo_dir.path(), "origin").unwrap();

        let base = tempfile::tempdir().unwrap();
        write_pkg(base.path(), "base", "1.0.0", json!([]));
        repo.import_dir(base.path(), crucible_foundation::IfExists::Fail).unwrap();

        let app = tempfile::tempdir().unwrap();
        write_pkg(
            app.path(),
            "app",
            "2.0.0",
            json!([{"name": "base", "acceptable_versions": "^1.0.0", "uses": ["core"]}]),
        );
        repo.import_dir(app.path(), crucible_foundation::IfExists::Fail).unwrap();

        let cache = make_cache(repo_dir.path());
        let root_deps = vec![dep("app", &["core"])];
        let solution = solve(&cache, &root_deps, &[], false).unwrap();

        assert_eq!(solution.packages.len(), 2);
        let app_pkg = solution.packages.iter().find(|p| p.id.name == NameBuf::new("app").unwrap()).unwrap();
        assert!(app_pkg.needed_libs.contains(&NameBuf::new("core").unwrap()));
        let base_pkg = solution.packages.iter().find(|p| p.id.name == NameBuf::new("base").unwrap()).unwrap();
        assert!(base_pkg.needed_libs.contains(&NameBuf::new("core").unwrap()));
    }

    #[test]
    fn fails_with_usage_no_such_lib() {
        let repo_dir = tempfile::tempdir().unwrap();
        let mut repo = crucible_storage::Repository::create(repo_dir.path(), "origin").unwrap();
        let base = tempfile::tempdir().unwrap();
        write_pkg(base.path(), "base", "1.0.0", json!([]));
        repo.import_dir(base.path(), crucible_foundation::IfExists::Fail).unwrap();

        let cache = make_cache(repo_dir.path());
        let root_deps = vec![dep("base", &["does-not-exist"])];
        let err = solve(&cache, &root_deps, &[], false).unwrap_err();
        assert!(matches!(err, Error::UsageNoSuchLib { .. }));
    }

    #[test]
    fn unactivated_library_with_unsatisfiable_dependency_does_not_block_solution() {
        let repo_dir = tempfile::tempdir().unwrap();
        let mut repo = crucible_storage::Repository::create(repo_dir.path(), "origin").unwrap();

        let base = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(base.path().join("lib/core/src")).unwrap();
        std::fs::write(base.path().join("lib/core/src/a.cpp"), "int main(){}").unwrap();
        std::fs::create_dir_all(base.path().join("lib/spare/src")).unwrap();
        std::fs::write(base.path().join("lib/spare/src/a.cpp"), "int main(){}").unwrap();
        let manifest = json!({
            "schema-version": 1,
            "id": {"name": "base", "version": "1.0.0", "revision": 1},
            "libraries": [
                {
                    "name": "core",
                    "path": "lib/core",
                    "intra_using": [],
                    "intra_test_using": [],
                    "dependencies": [],
                    "test_dependencies": []
                },
                {
                    // Never reached by any `uses` edge from the root, and
                    // depends on a package absent from the cache, so the
                    // solver must not let its range poison `base`'s solve.
                    "name": "spare",
                    "path": "lib/spare",
                    "intra_using": [],
                    "intra_test_using": [],
                    "dependencies": [{"name": "ghost", "acceptable_versions": "^1.0.0", "uses": []}],
                    "test_dependencies": []
                }
            ]
        });
        std::fs::write(base.path().join("pkg.json"), serde_json::to_string(&manifest).unwrap()).unwrap();
        repo.import_dir(base.path(), crucible_foundation::IfExists::Fail).unwrap();

        let cache = make_cache(repo_dir.path());
        let root_deps = vec![dep("base", &["core"])];
        let solution = solve(&cache, &root_deps, &[], false).unwrap();

        assert_eq!(solution.packages.len(), 1);
        let base_pkg = &solution.packages[0];
        assert!(base_pkg.needed_libs.contains(&NameBuf::new("core").unwrap()));
        assert!(!base_pkg.needed_libs.contains(&NameBuf::new("spare").unwrap()));
    }

    #[test]
    fn fails_with_no_solution_when_range_unsatisfiable() {
        let repo_dir = tempfile::tempdir().unwrap();
        let mut repo = crucible_storage::Repository::create(repo_dir.path(), "origin").unwrap();
        let base = tempfile::tempdir().unwrap();
        write_pkg(base.path(), "base", "1.0.0", json!([]));
        repo.import_dir(base.path(), crucible_foundation::IfExists::Fail).unwrap();

        let cache = make_cache(repo_dir.path());
        let root_deps = vec![Dependency {
            name: NameBuf::new("base").unwrap(),
            acceptable_versions: VersionRangeSet::single(
                Interval::new(Version::parse("5.0.0").unwrap(), Version::parse("6.0.0").unwrap()).unwrap(),
            ),
            uses: vec![],
        }];
        let err = solve(&cache, &root_deps, &[], false).unwrap_err();
        assert!(matches!(err, Error::DependencySolveFailure { .. }));
    }
}
