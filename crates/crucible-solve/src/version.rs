use std::fmt;

use crucible_foundation::Version;

/// Adapts our `semver`-backed [`Version`] to pubgrub's `Version` trait,
/// which additionally requires a lowest element and a `bump` operation used
/// internally to construct open-ended ranges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SolverVersion(pub Version);

impl SolverVersion {
    pub fn version(&self) -> &Version {
        &self.0
    }
}

impl fmt::Display for SolverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl pubgrub::version::Version for SolverVersion {
    fn lowest() -> Self {
        SolverVersion(Version::parse("0.0.0").expect("valid"))
    }

    fn bump(&self) -> Self {
        let v = &self.0;
        SolverVersion(Version::parse(&format!("{}.{}.{}", v.major(), v.minor(), v.patch() + 1)).expect("valid"))
    }
}
