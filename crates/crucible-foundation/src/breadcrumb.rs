//! The shared breadcrumb carrier used by every crate's error type (spec §4.J, §7).
//!
//! A `Breadcrumb` is attached to a failing call frame on the way up the
//! stack; the CLI boundary pattern-matches on the accumulated list to
//! render context-rich messages and to select the stable error marker
//! string that the test suite uses as an oracle.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Breadcrumb {
    RepoOpenPath(String),
    RepoImportSrc(String),
    SyncRemote(String),
    ParseProjectManifestPath(String),
    LoadToolchainPath(String),
    SolveRequirement(String),
    CompileOutput(String),
    LinkOutput(String),
    TestExecutable(String),
    Custom(&'static str, String),
}

impl fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breadcrumb::RepoOpenPath(p) => write!(f, "opening repository at {p}"),
            Breadcrumb::RepoImportSrc(p) => write!(f, "importing source distribution from {p}"),
            Breadcrumb::SyncRemote(u) => write!(f, "synchronizing remote {u}"),
            Breadcrumb::ParseProjectManifestPath(p) => write!(f, "parsing project manifest {p}"),
            Breadcrumb::LoadToolchainPath(p) => write!(f, "loading toolchain {p}"),
            Breadcrumb::SolveRequirement(r) => write!(f, "solving requirement {r}"),
            Breadcrumb::CompileOutput(p) => write!(f, "compiling {p}"),
            Breadcrumb::LinkOutput(p) => write!(f, "linking {p}"),
            Breadcrumb::TestExecutable(p) => write!(f, "running test {p}"),
            Breadcrumb::Custom(label, detail) => write!(f, "{label}: {detail}"),
        }
    }
}

/// A stack of breadcrumbs attached to an error, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trail(Vec<Breadcrumb>);

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, crumb: Breadcrumb) -> Self {
        self.0.push(crumb);
        self
    }

    pub fn crumbs(&self) -> &[Breadcrumb] {
        &self.0
    }
}

impl fmt::Display for Trail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for crumb in self.0.iter().rev() {
            writeln!(f, "  while {crumb}")?;
        }
        Ok(())
    }
}
