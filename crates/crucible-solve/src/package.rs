use std::fmt;

use crucible_foundation::NameBuf;

/// A solver-level package: either the synthetic root (the project being
/// built) or a named package from the CRS cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pkg {
    Root,
    Named(NameBuf),
}

impl fmt::Display for Pkg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pkg::Root => write!(f, "<root>"),
            Pkg::Named(name) => write!(f, "{name}"),
        }
    }
}
