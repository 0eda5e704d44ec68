use std::path::PathBuf;
use std::time::Duration;

use crucible_foundation::Usage;
use crucible_toolchain::DepsMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    App,
    Test,
}

#[derive(Debug, Clone)]
pub struct CompileNode {
    pub owner: Usage,
    pub source: PathBuf,
    pub output: PathBuf,
    pub command: Vec<String>,
    /// How the compiler reports header dependencies for this command, so
    /// the scheduler knows whether to parse a side `.d` file or captured
    /// stdout (SPEC_FULL §4.G).
    pub deps_mode: DepsMode,
    /// GNU `.d` file path, present only when `deps_mode` is `Gnu`.
    pub dep_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ArchiveNode {
    pub owner: Usage,
    pub output: PathBuf,
    pub command_template: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LinkNode {
    pub owner: Usage,
    pub kind: LinkKind,
    /// Stem name of the produced binary (e.g. the source file's stem).
    pub name: String,
    pub output: PathBuf,
    pub command_template: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TestNode {
    pub owner: Usage,
    pub name: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub enum BuildNode {
    Compile(CompileNode),
    Archive(ArchiveNode),
    Link(LinkNode),
    Test(TestNode),
}
