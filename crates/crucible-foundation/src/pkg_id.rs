//! Package identity: `(name, version, revision)` (spec §3.1).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::name::{InvalidNameError, NameBuf};
use crate::version::{InvalidVersionError, Version};

#[derive(thiserror::Error, Debug)]
pub enum InvalidPkgIdError {
    #[error("expected `name@version~revision`, found `{0}`")]
    MalformedString(String),
    #[error(transparent)]
    Name(#[from] InvalidNameError),
    #[error(transparent)]
    Version(#[from] InvalidVersionError),
    #[error("revision must be a positive integer, found `{0}`")]
    InvalidRevision(String),
}

/// A package revision: always `>= 1` once stored in a repository (§3.2).
/// `0` is reserved for CLI-facing shorthand meaning "unconstrained,
/// resolve to the highest available" (SPEC_FULL §9.1).
pub type Revision = u32;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PkgId {
    pub name: NameBuf,
    pub version: Version,
    pub revision: Revision,
}

impl PkgId {
    pub fn new(name: NameBuf, version: Version, revision: Revision) -> Self {
        Self {
            name,
            version,
            revision,
        }
    }

    pub fn is_unconstrained_revision(&self) -> bool {
        self.revision == 0
    }

    /// Parses `name@version` or `name@version~revision`. A missing
    /// `~revision` suffix parses as revision `0` (unconstrained).
    pub fn parse(s: &str) -> Result<Self, InvalidPkgIdError> {
        let (name_part, rest) = s
            .split_once('@')
            .ok_or_else(|| InvalidPkgIdError::MalformedString(s.to_owned()))?;
        let (version_part, revision_part) = match rest.split_once('~') {
            Some((v, r)) => (v, Some(r)),
            None => (rest, None),
        };
        let name = NameBuf::new(name_part)?;
        let version = Version::parse(version_part)?;
        let revision = match revision_part {
            Some(r) => r
                .parse::<Revision>()
                .map_err(|_| InvalidPkgIdError::InvalidRevision(r.to_owned()))?,
            None => 0,
        };
        Ok(Self::new(name, version, revision))
    }
}

impl fmt::Display for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision == 0 {
            write!(f, "{}@{}", self.name, self.version)
        } else {
            write!(f, "{}@{}~{}", self.name, self.version, self.revision)
        }
    }
}

impl FromStr for PkgId {
    type Err = InvalidPkgIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_revision() {
        let id = PkgId::parse("fmt@9.1.0~3").unwrap();
        assert_eq!(id.to_string(), "fmt@9.1.0~3");
    }

    #[test]
    fn missing_revision_is_zero() {
        let id = PkgId::parse("fmt@9.1.0").unwrap();
        assert_eq!(id.revision, 0);
        assert!(id.is_unconstrained_revision());
    }

    #[test]
    fn orders_lexicographically() {
        let a = PkgId::parse("fmt@9.1.0~1").unwrap();
        let b = PkgId::parse("fmt@9.1.0~2").unwrap();
        let c = PkgId::parse("fmt@9.2.0~1").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(PkgId::parse("fmt-9.1.0").is_err());
        assert!(PkgId::parse("fmt@not-a-version").is_err());
    }
}
