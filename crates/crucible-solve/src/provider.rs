use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use pubgrub::range::Range;
use pubgrub::solver::{choose_package_with_fewest_versions, Dependencies, DependencyProvider};
use pubgrub::type_aliases::DependencyConstraints;
use pubgrub::version::Version as _;

use crucible_crs::CrsCache;
use crucible_foundation::{NameBuf, VersionRangeSet};
use crucible_metadata::Dependency;

use crate::package::Pkg;
use crate::version::SolverVersion;

/// Feeds the `pubgrub` search with candidates and dependency edges sourced
/// from a [`CrsCache`]. The version-range constraints themselves are
/// restricted to libraries an incoming `uses` edge actually activates
/// (`activated_libs`); the later worklist pass in `solve::solve` still
/// does the full per-library `uses` propagation over the fixed version
/// assignment (SPEC_FULL §4.D) — this crate only needs enough of that
/// picture to avoid merging an unreachable library's dependency range
/// into the constraints pubgrub solves against.
pub struct CrsProvider<'a> {
    cache: &'a CrsCache,
    root_edges: Vec<(NameBuf, VersionRangeSet)>,
    /// Package name -> union of library names activated by every `uses`
    /// edge discovered so far that targets it. Grows monotonically as
    /// `get_dependencies` walks further into the graph; an edge with an
    /// empty `uses` activates the single library sharing the package's
    /// own name, mirroring `crucible_build::usage`'s default.
    activated_libs: RefCell<HashMap<NameBuf, BTreeSet<NameBuf>>>,
}

impl<'a> CrsProvider<'a> {
    pub fn new(cache: &'a CrsCache, root_dependencies: &[Dependency]) -> Self {
        let root_edges = root_dependencies
            .iter()
            .map(|d| (d.name.clone(), d.acceptable_versions.clone()))
            .collect();
        let mut activated_libs = HashMap::new();
        for dep in root_dependencies {
            record_activated_libs(&mut activated_libs, dep);
        }
        Self {
            cache,
            root_edges,
            activated_libs: RefCell::new(activated_libs),
        }
    }

    fn list_versions(&self, pkg: &Pkg) -> Vec<SolverVersion> {
        match pkg {
            Pkg::Root => vec![SolverVersion::lowest()],
            Pkg::Named(name) => {
                let rows = self.cache.enabled_packages(name, None).unwrap_or_else(|err| {
                    tracing::warn!(%name, error = %err, "failed to list candidate versions");
                    Vec::new()
                });
                let mut versions: Vec<SolverVersion> =
                    rows.into_iter().map(|p| SolverVersion(p.id.version)).collect();
                versions.sort();
                versions.dedup();
                versions.reverse(); // descending: highest version first
                versions
            }
        }
    }
}

impl<'a> DependencyProvider<Pkg, SolverVersion> for CrsProvider<'a> {
    fn choose_package_version<T: std::borrow::Borrow<Pkg>, U: std::borrow::Borrow<Range<SolverVersion>>>(
        &self,
        potential_packages: impl Iterator<Item = (T, U)>,
    ) -> Result<(T, Option<SolverVersion>), Box<dyn std::error::Error>> {
        Ok(choose_package_with_fewest_versions(
            |p| self.list_versions(p).into_iter(),
            potential_packages,
        ))
    }

    fn get_dependencies(
        &self,
        package: &Pkg,
        version: &SolverVersion,
    ) -> Result<Dependencies<Pkg, SolverVersion>, Box<dyn std::error::Error>> {
        match package {
            Pkg::Root => {
                let mut constraints = DependencyConstraints::<Pkg, SolverVersion>::default();
                for (name, range) in &self.root_edges {
                    constraints.insert(Pkg::Named(name.clone()), range_from_set(range));
                }
                Ok(Dependencies::Known(constraints))
            }
            Pkg::Named(name) => {
                let candidates = self.cache.enabled_packages(name, Some(version.version()))?;
                let Some(chosen) = candidates.into_iter().next() else {
                    return Ok(Dependencies::Unknown);
                };

                // Default to "the library named like the package" for a
                // package nobody has activated by name yet (e.g. it was
                // offered as a candidate but no edge recorded against it
                // under this exact name) rather than falling back to every
                // library in the package.
                let activated = self.activated_libs.borrow().get(name).cloned().unwrap_or_else(|| {
                    let mut s = BTreeSet::new();
                    s.insert(name.clone());
                    s
                });

                let mut merged: HashMap<NameBuf, Range<SolverVersion>> = HashMap::new();
                for lib in chosen.metadata.libraries.iter().filter(|lib| activated.contains(&lib.name)) {
                    for dep in &lib.dependencies {
                        merge_constraint(&mut merged, dep);
                        record_activated_libs(&mut self.activated_libs.borrow_mut(), dep);
                    }
                }
                let mut constraints = DependencyConstraints::<Pkg, SolverVersion>::default();
                for (dep_name, range) in merged {
                    constraints.insert(Pkg::Named(dep_name), range);
                }
                Ok(Dependencies::Known(constraints))
            }
        }
    }
}

fn merge_constraint(merged: &mut HashMap<NameBuf, Range<SolverVersion>>, dep: &Dependency) {
    let incoming = range_from_set(&dep.acceptable_versions);
    merged
        .entry(dep.name.clone())
        .and_modify(|existing| *existing = existing.intersection(&incoming))
        .or_insert(incoming);
}

/// An edge with no explicit `uses` activates the single library sharing
/// the package's own name (`crucible_build::usage::UsageGraph::build`'s
/// same default); otherwise it activates exactly the named libraries.
fn record_activated_libs(activated: &mut HashMap<NameBuf, BTreeSet<NameBuf>>, dep: &Dependency) {
    let entry = activated.entry(dep.name.clone()).or_default();
    if dep.uses.is_empty() {
        entry.insert(dep.name.clone());
    } else {
        entry.extend(dep.uses.iter().cloned());
    }
}

fn range_from_set(set: &VersionRangeSet) -> Range<SolverVersion> {
    set.intervals()
        .iter()
        .map(|i| Range::between(SolverVersion(i.low.clone()), SolverVersion(i.high.clone())))
        .fold(Range::none(), |acc, r| acc.union(&r))
}
