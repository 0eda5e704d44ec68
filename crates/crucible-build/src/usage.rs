//! Usage-requirements aggregator (SPEC_FULL §4.I): given the set of
//! activated libraries, computes each library's transitive include paths
//! and records its `uses` edges for export.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;

use crucible_foundation::{NameBuf, PkgId, Usage};
use crucible_metadata::LibraryInfo;

use crate::error::{Error, Result};

/// One package's contribution to the build: either the project's own root
/// package (`id: None`) or a solver-resolved dependency.
#[derive(Debug, Clone)]
pub struct ActivatedPackage {
    pub name: NameBuf,
    pub id: Option<PkgId>,
    pub libraries: Vec<LibraryInfo>,
    pub source_root: PathBuf,
    pub needed_libs: BTreeSet<NameBuf>,
}

impl ActivatedPackage {
    fn library(&self, name: &NameBuf) -> Option<&LibraryInfo> {
        self.libraries.iter().find(|l| &l.name == name)
    }
}

#[derive(Debug)]
pub struct UsageRequirements {
    pub include_paths: Vec<PathBuf>,
    pub linkable_path: Option<PathBuf>,
    pub uses: Vec<Usage>,
}

/// The directed graph of activated `Use edge`s (glossary), built once per
/// plan construction.
pub struct UsageGraph<'a> {
    packages: HashMap<NameBuf, &'a ActivatedPackage>,
    edges: HashMap<Usage, Vec<Usage>>,
}

impl<'a> UsageGraph<'a> {
    pub fn build(packages: &'a [ActivatedPackage], build_tests: bool) -> Result<Self> {
        let by_name: HashMap<NameBuf, &'a ActivatedPackage> =
            packages.iter().map(|p| (p.name.clone(), p)).collect();

        let mut edges: HashMap<Usage, Vec<Usage>> = HashMap::new();
        for pkg in packages {
            for lib_name in &pkg.needed_libs {
                let Some(lib) = pkg.library(lib_name) else {
                    return Err(Error::EmptyPackage(pkg.name.clone()));
                };
                let usage = Usage::new(pkg.name.clone(), lib.name.clone());
                let mut targets = Vec::new();
                for sibling in &lib.intra_using {
                    targets.push(Usage::new(pkg.name.clone(), sibling.clone()));
                }
                if build_tests {
                    for sibling in &lib.intra_test_using {
                        targets.push(Usage::new(pkg.name.clone(), sibling.clone()));
                    }
                }
                let mut deps = lib.dependencies.iter().collect::<Vec<_>>();
                if build_tests {
                    deps.extend(lib.test_dependencies.iter());
                }
                for dep in deps {
                    let lib_names: Vec<NameBuf> = if dep.uses.is_empty() {
                        vec![dep.name.clone()]
                    } else {
                        dep.uses.clone()
                    };
                    for target_lib in lib_names {
                        targets.push(Usage::new(dep.name.clone(), target_lib));
                    }
                }
                edges.insert(usage, targets);
            }
        }

        let graph = Self { packages: by_name, edges };
        graph.check_acyclic()?;
        Ok(graph)
    }

    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }
        let mut color: HashMap<Usage, Color> =
            self.edges.keys().map(|u| (u.clone(), Color::White)).collect();

        for start in self.edges.keys() {
            if color.get(start) != Some(&Color::White) {
                continue;
            }
            // Explicit stack of (node, next-child-index) to avoid recursion
            // (SPEC_FULL §9's "free-form recursion" redesign note).
            let mut stack: Vec<(Usage, usize)> = vec![(start.clone(), 0)];
            color.insert(start.clone(), Color::Gray);

            while let Some((node, idx)) = stack.pop() {
                let children = self.edges.get(&node).map(Vec::as_slice).unwrap_or(&[]);
                if idx < children.len() {
                    let child = children[idx].clone();
                    stack.push((node.clone(), idx + 1));
                    match color.get(&child).copied().unwrap_or(Color::White) {
                        Color::White => {
                            color.insert(child.clone(), Color::Gray);
                            stack.push((child, 0));
                        }
                        Color::Gray => return Err(Error::UsageCycle(child)),
                        Color::Black => {}
                    }
                } else {
                    color.insert(node, Color::Black);
                }
            }
        }
        Ok(())
    }

    pub fn direct_uses(&self, usage: &Usage) -> &[Usage] {
        self.edges.get(usage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Breadth-first transitive closure, including `root` itself.
    pub fn closure(&self, root: &Usage) -> Vec<Usage> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(root.clone());
        seen.insert(root.clone());
        while let Some(usage) = queue.pop_front() {
            order.push(usage.clone());
            for next in self.direct_uses(&usage) {
                if seen.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
        order
    }

    pub fn include_paths_for(&self, usage: &Usage) -> Vec<PathBuf> {
        self.closure(usage)
            .iter()
            .filter_map(|u| self.include_dir(u))
            .collect()
    }

    fn include_dir(&self, usage: &Usage) -> Option<PathBuf> {
        let pkg = self.packages.get(&usage.namespace)?;
        let lib = pkg.library(&usage.library_name)?;
        Some(pkg.source_root.join(&lib.path).join("include"))
    }
}
