use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use petgraph::graph::{DiGraph, NodeIndex};

use crucible_foundation::Usage;
use crucible_toolchain::{Lang, Toolchain};

use crate::error::{Error, Result};
use crate::node::{ArchiveNode, BuildNode, CompileNode, LinkKind, LinkNode, TestNode};
use crate::source::{scan_sources, SourceFile, SourceKind};
use crate::usage::{ActivatedPackage, UsageGraph, UsageRequirements};

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub build_tests: bool,
    pub build_apps: bool,
    pub warnings: bool,
    pub out_dir: PathBuf,
    /// Appended to every compile's include search path (SPEC_FULL glossary
    /// "Tweaks-dir").
    pub tweaks_dir: Option<PathBuf>,
    pub test_timeout: Option<Duration>,
}

pub struct BuildPlan {
    pub graph: DiGraph<BuildNode, ()>,
    pub compiles: Vec<NodeIndex>,
    pub archives: Vec<NodeIndex>,
    pub links: Vec<NodeIndex>,
    pub tests: Vec<NodeIndex>,
    pub requirements: HashMap<Usage, UsageRequirements>,
}

/// A library staged for node construction, computed in the first pass so
/// that the second pass (links) can see every library's resolved archive
/// path regardless of package iteration order.
struct StagedLibrary {
    usage: Usage,
    lib_root: PathBuf,
    sources: Vec<SourceFile>,
    extra_flags: Vec<String>,
    linkable_path: Option<PathBuf>,
}

impl BuildPlan {
    pub fn build(toolchain: &Toolchain, packages: &[ActivatedPackage], opts: &PlanOptions) -> Result<Self> {
        let usage_graph = UsageGraph::build(packages, opts.build_tests)?;

        let mut graph = DiGraph::new();
        let mut compiles = Vec::new();
        let mut archives = Vec::new();
        let mut links = Vec::new();
        let mut tests = Vec::new();
        let mut requirements = HashMap::new();
        let mut staged: Vec<StagedLibrary> = Vec::new();

        // Pass 1: scan sources, emit compile + archive nodes, and record
        // each library's include paths / archive output so pass 2 can look
        // up any transitively-used library regardless of iteration order.
        for pkg in packages {
            let mut lib_names: Vec<_> = pkg.needed_libs.iter().cloned().collect();
            lib_names.sort();

            for lib_name in lib_names {
                let Some(lib) = pkg.libraries.iter().find(|l| l.name == lib_name) else {
                    return Err(Error::EmptyPackage(pkg.name.clone()));
                };
                let usage = Usage::new(pkg.name.clone(), lib.name.clone());
                let lib_root = pkg.source_root.join(&lib.path);
                let sources = scan_sources(&lib_root)?;

                let include_paths = usage_graph.include_paths_for(&usage);
                let mut extra_flags = Vec::new();
                for path in &include_paths {
                    extra_flags.extend(toolchain.include_flags(&path.to_string_lossy(), false));
                }
                if let Some(tweaks) = &opts.tweaks_dir {
                    extra_flags.extend(toolchain.include_flags(&tweaks.to_string_lossy(), true));
                }

                let mut lib_compiles = Vec::new();
                let mut lib_compile_outputs = Vec::new();
                for source in sources.iter().filter(|s| s.kind == SourceKind::Lib) {
                    let (idx, output) = push_compile(&mut graph, toolchain, opts, &usage, &lib_root, source, &extra_flags);
                    lib_compiles.push(idx);
                    lib_compile_outputs.push(output.to_string_lossy().into_owned());
                    compiles.push(idx);
                }

                let linkable_path = if lib_compiles.is_empty() {
                    None
                } else {
                    let output = opts
                        .out_dir
                        .join(format!("{}-{}", pkg.name, lib.name))
                        .join(toolchain.archive_file_name(lib.name.as_str()));
                    let command_template =
                        toolchain.create_archive_command(&lib_compile_outputs, &output.to_string_lossy());
                    let archive_idx = graph.add_node(BuildNode::Archive(ArchiveNode {
                        owner: usage.clone(),
                        output: output.clone(),
                        command_template,
                    }));
                    for compile_idx in &lib_compiles {
                        graph.add_edge(*compile_idx, archive_idx, ());
                    }
                    archives.push(archive_idx);
                    Some(output)
                };

                requirements.insert(
                    usage.clone(),
                    UsageRequirements {
                        include_paths,
                        linkable_path: linkable_path.clone(),
                        uses: usage_graph.direct_uses(&usage).to_vec(),
                    },
                );

                staged.push(StagedLibrary {
                    usage,
                    lib_root,
                    sources,
                    extra_flags,
                    linkable_path,
                });
            }
        }

        // Pass 2: app/test link nodes, now that every library's archive
        // path (if any) is known.
        for lib in &staged {
            let archive_closure: Vec<PathBuf> = usage_graph
                .closure(&lib.usage)
                .iter()
                .filter(|u| **u != lib.usage)
                .filter_map(|u| requirements.get(u).and_then(|r| r.linkable_path.clone()))
                .collect();

            if opts.build_apps {
                for source in lib.sources.iter().filter(|s| s.kind == SourceKind::App) {
                    push_link(
                        &mut graph,
                        toolchain,
                        opts,
                        &lib.usage,
                        &lib.lib_root,
                        source,
                        LinkKind::App,
                        lib.linkable_path.as_ref(),
                        &archive_closure,
                        &lib.extra_flags,
                        &mut links,
                        &mut tests,
                    );
                }
            }
            if opts.build_tests {
                for source in lib.sources.iter().filter(|s| s.kind == SourceKind::Test) {
                    push_link(
                        &mut graph,
                        toolchain,
                        opts,
                        &lib.usage,
                        &lib.lib_root,
                        source,
                        LinkKind::Test,
                        lib.linkable_path.as_ref(),
                        &archive_closure,
                        &lib.extra_flags,
                        &mut links,
                        &mut tests,
                    );
                }
            }
        }

        Ok(Self {
            graph,
            compiles,
            archives,
            links,
            tests,
            requirements,
        })
    }
}

fn push_compile(
    graph: &mut DiGraph<BuildNode, ()>,
    toolchain: &Toolchain,
    opts: &PlanOptions,
    usage: &Usage,
    lib_root: &std::path::Path,
    source: &SourceFile,
    extra_flags: &[String],
) -> (NodeIndex, PathBuf) {
    let lang: Lang = source.lang.into();
    let source_path = lib_root.join("src").join(&source.relative_path);
    let stem = source.relative_path.with_extension("");
    let output = opts
        .out_dir
        .join(format!("{}-{}", usage.namespace, usage.library_name))
        .join(toolchain.object_file_name(&stem.to_string_lossy()));

    let mut flags = if opts.warnings {
        toolchain.compile_flags(lang)
    } else {
        toolchain.compile_flags_no_warnings(lang)
    };
    flags.extend(extra_flags.iter().cloned());
    flags.extend(toolchain.deps_flags(&output.to_string_lossy()));

    let command = toolchain.compile_command_with_flags(
        lang,
        &source_path.to_string_lossy(),
        &output.to_string_lossy(),
        &flags,
    );

    let idx = graph.add_node(BuildNode::Compile(CompileNode {
        owner: usage.clone(),
        source: source_path,
        output: output.clone(),
        command,
        deps_mode: toolchain.deps_mode,
        dep_file: toolchain.dep_file_path(&output.to_string_lossy()).map(PathBuf::from),
    }));
    (idx, output)
}

#[allow(clippy::too_many_arguments)]
fn push_link(
    graph: &mut DiGraph<BuildNode, ()>,
    toolchain: &Toolchain,
    opts: &PlanOptions,
    usage: &Usage,
    lib_root: &std::path::Path,
    source: &SourceFile,
    kind: LinkKind,
    own_archive: Option<&PathBuf>,
    dep_archives: &[PathBuf],
    extra_flags: &[String],
    links: &mut Vec<NodeIndex>,
    tests: &mut Vec<NodeIndex>,
) {
    let lang: Lang = source.lang.into();
    let source_path = lib_root.join("src").join(&source.relative_path);
    let stem = source
        .relative_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();

    let compile_output = opts
        .out_dir
        .join(format!("{}-{}", usage.namespace, usage.library_name))
        .join(toolchain.object_file_name(&format!("{stem}-driver")));

    let mut flags = if opts.warnings {
        toolchain.compile_flags(lang)
    } else {
        toolchain.compile_flags_no_warnings(lang)
    };
    flags.extend(extra_flags.iter().cloned());
    flags.extend(toolchain.deps_flags(&compile_output.to_string_lossy()));
    let compile_command = toolchain.compile_command_with_flags(
        lang,
        &source_path.to_string_lossy(),
        &compile_output.to_string_lossy(),
        &flags,
    );
    let compile_idx = graph.add_node(BuildNode::Compile(CompileNode {
        owner: usage.clone(),
        source: source_path,
        output: compile_output.clone(),
        command: compile_command,
        deps_mode: toolchain.deps_mode,
        dep_file: toolchain.dep_file_path(&compile_output.to_string_lossy()).map(PathBuf::from),
    }));

    let exe_output = opts
        .out_dir
        .join(format!("{}-{}", usage.namespace, usage.library_name))
        .join(toolchain.exe_file_name(&stem));
    let mut inputs = vec![compile_output.to_string_lossy().into_owned()];
    if let Some(own) = own_archive {
        inputs.push(own.to_string_lossy().into_owned());
    }
    inputs.extend(dep_archives.iter().map(|p| p.to_string_lossy().into_owned()));

    let link_command = toolchain.link_executable_command(lang, &inputs, &exe_output.to_string_lossy());
    let link_idx = graph.add_node(BuildNode::Link(LinkNode {
        owner: usage.clone(),
        kind,
        name: stem.clone(),
        output: exe_output,
        command_template: link_command,
    }));
    graph.add_edge(compile_idx, link_idx, ());
    links.push(link_idx);

    if kind == LinkKind::Test {
        let test_idx = graph.add_node(BuildNode::Test(TestNode {
            owner: usage.clone(),
            name: stem,
            timeout: opts.test_timeout,
        }));
        graph.add_edge(link_idx, test_idx, ());
        tests.push(test_idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    use crucible_foundation::NameBuf;
    use crucible_metadata::LibraryInfo;
    use serde_json::json;

    fn empty_lib(name: &str, path: &str) -> LibraryInfo {
        LibraryInfo {
            name: NameBuf::new(name).unwrap(),
            path: path.to_string(),
            intra_using: Vec::new(),
            intra_test_using: Vec::new(),
            dependencies: Vec::new(),
            test_dependencies: Vec::new(),
        }
    }

    fn opts(out_dir: PathBuf) -> PlanOptions {
        PlanOptions {
            build_tests: true,
            build_apps: true,
            warnings: true,
            out_dir,
            tweaks_dir: None,
            test_timeout: None,
        }
    }

    #[test]
    fn simple_project_with_one_source_produces_one_compile_and_one_archive() {
        let project = tempfile::tempdir().unwrap();
        let src = project.path().join("lib/core/src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.cpp"), "").unwrap();

        let toolchain = Toolchain::from_json(&json!({"compiler_id": "gnu"})).unwrap();
        let root = ActivatedPackage {
            name: NameBuf::new("myproject").unwrap(),
            id: None,
            libraries: vec![empty_lib("core", "lib/core")],
            source_root: project.path().to_path_buf(),
            needed_libs: BTreeSet::from([NameBuf::new("core").unwrap()]),
        };

        let out_dir = project.path().join("out");
        let plan = BuildPlan::build(&toolchain, &[root], &opts(out_dir)).unwrap();
        assert_eq!(plan.compiles.len(), 1);
        assert_eq!(plan.archives.len(), 1);
        assert!(plan.links.is_empty());
        assert!(plan.tests.is_empty());
    }

    #[test]
    fn test_and_app_sources_produce_link_and_test_nodes() {
        let project = tempfile::tempdir().unwrap();
        let src = project.path().join("lib/core/src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.cpp"), "").unwrap();
        fs::write(src.join("a.test.cpp"), "").unwrap();
        fs::write(src.join("tool.main.cpp"), "").unwrap();

        let toolchain = Toolchain::from_json(&json!({"compiler_id": "gnu"})).unwrap();
        let root = ActivatedPackage {
            name: NameBuf::new("myproject").unwrap(),
            id: None,
            libraries: vec![empty_lib("core", "lib/core")],
            source_root: project.path().to_path_buf(),
            needed_libs: BTreeSet::from([NameBuf::new("core").unwrap()]),
        };

        let out_dir = project.path().join("out");
        let plan = BuildPlan::build(&toolchain, &[root], &opts(out_dir)).unwrap();
        assert_eq!(plan.compiles.len(), 3); // lib source + test driver + app driver
        assert_eq!(plan.archives.len(), 1);
        assert_eq!(plan.links.len(), 2);
        assert_eq!(plan.tests.len(), 1);
    }

    #[test]
    fn cyclic_intra_using_is_rejected() {
        let project = tempfile::tempdir().unwrap();
        fs::create_dir_all(project.path().join("lib/a/src")).unwrap();
        fs::create_dir_all(project.path().join("lib/b/src")).unwrap();

        let mut a = empty_lib("a", "lib/a");
        a.intra_using.push(NameBuf::new("b").unwrap());
        let mut b = empty_lib("b", "lib/b");
        b.intra_using.push(NameBuf::new("a").unwrap());

        let toolchain = Toolchain::from_json(&json!({"compiler_id": "gnu"})).unwrap();
        let root = ActivatedPackage {
            name: NameBuf::new("myproject").unwrap(),
            id: None,
            libraries: vec![a, b],
            source_root: project.path().to_path_buf(),
            needed_libs: BTreeSet::from([NameBuf::new("a").unwrap(), NameBuf::new("b").unwrap()]),
        };

        let out_dir = project.path().join("out");
        let err = BuildPlan::build(&toolchain, &[root], &opts(out_dir)).unwrap_err();
        assert!(matches!(err, Error::UsageCycle(_)));
    }
}
