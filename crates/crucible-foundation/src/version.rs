//! Semantic versions (spec §3.1).
//!
//! Ordering and pre-release comparison are delegated entirely to `semver`,
//! whose rules already match what's required here: a pre-release compares
//! lower than the plain release it precedes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
#[error("invalid version `{input}`: {source}")]
pub struct InvalidVersionError {
    pub input: String,
    #[source]
    pub source: semver::Error,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(semver::Version);

impl Version {
    pub fn parse(s: &str) -> Result<Self, InvalidVersionError> {
        semver::Version::parse(s)
            .map(Version)
            .map_err(|source| InvalidVersionError {
                input: s.to_owned(),
                source,
            })
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    pub fn inner(&self) -> &semver::Version {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Version {
    type Err = InvalidVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = InvalidVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_prerelease_below_release() {
        let pre = Version::parse("1.0.0-alpha.1").unwrap();
        let release = Version::parse("1.0.0").unwrap();
        assert!(pre < release);
    }

    #[test]
    fn round_trips_through_display() {
        let v = Version::parse("1.2.3-rc.1+build5").unwrap();
        assert_eq!(Version::parse(&v.to_string()).unwrap(), v);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(Version::parse("not-a-version").is_err());
    }
}
