//! Version range sets: unions of half-open intervals `[low, high)` (spec §3.2).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::{InvalidVersionError, Version};

/// A single half-open interval `[low, high)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub low: Version,
    pub high: Version,
}

impl Interval {
    pub fn new(low: Version, high: Version) -> Result<Self, InvalidRangeError> {
        if high <= low {
            return Err(InvalidRangeError::EmptyInterval {
                low: low.to_string(),
                high: high.to_string(),
            });
        }
        Ok(Self { low, high })
    }

    pub fn contains(&self, v: &Version) -> bool {
        *v >= self.low && *v < self.high
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InvalidRangeError {
    #[error("interval [{low}, {high}) is empty: high must be greater than low")]
    EmptyInterval { low: String, high: String },
    #[error("version range set must contain at least one interval")]
    Empty,
    #[error(transparent)]
    Version(#[from] InvalidVersionError),
    #[error("malformed version range shorthand `{0}`")]
    MalformedShorthand(String),
}

/// A non-empty union of [`Interval`]s. The "acceptable_versions" of a
/// dependency (spec §3.2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Interval>", into = "Vec<Interval>")]
pub struct VersionRangeSet(Vec<Interval>);

impl VersionRangeSet {
    pub fn new(mut intervals: Vec<Interval>) -> Result<Self, InvalidRangeError> {
        if intervals.is_empty() {
            return Err(InvalidRangeError::Empty);
        }
        intervals.sort_by(|a, b| a.low.cmp(&b.low));
        Ok(Self(intervals))
    }

    pub fn single(interval: Interval) -> Self {
        Self(vec![interval])
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.0
    }

    pub fn contains(&self, v: &Version) -> bool {
        self.0.iter().any(|i| i.contains(v))
    }

    /// Parses caret (`^1.2.3`), tilde (`~1.2.3`), exact (`=1.2.3`), bare
    /// (`1.2.3`, treated as caret) and explicit-bound (`>=1.2.0,<2.0.0`)
    /// shorthand, per the dependency-shorthand grammar (SPEC_FULL §9.1).
    pub fn parse(s: &str) -> Result<Self, InvalidRangeError> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix('=') {
            let v = Version::parse(rest)?;
            let high = bump_patch(&v);
            return Ok(Self::single(Interval::new(v, high)?));
        }
        if let Some(rest) = s.strip_prefix('^') {
            return caret_range(rest);
        }
        if let Some(rest) = s.strip_prefix('~') {
            return tilde_range(rest);
        }
        if s.contains(',') || s.starts_with(">=") {
            return explicit_range(s);
        }
        // bare version defaults to caret semantics
        caret_range(s)
    }
}

fn bump_patch(v: &Version) -> Version {
    Version::parse(&format!("{}.{}.{}", v.major(), v.minor(), v.patch() + 1)).expect("valid")
}

fn caret_range(rest: &str) -> Result<VersionRangeSet, InvalidRangeError> {
    let low = Version::parse(rest)?;
    let high = if low.major() > 0 {
        Version::parse(&format!("{}.0.0", low.major() + 1)).expect("valid")
    } else if low.minor() > 0 {
        Version::parse(&format!("0.{}.0", low.minor() + 1)).expect("valid")
    } else {
        Version::parse(&format!("0.0.{}", low.patch() + 1)).expect("valid")
    };
    Ok(VersionRangeSet::single(Interval::new(low, high)?))
}

fn tilde_range(rest: &str) -> Result<VersionRangeSet, InvalidRangeError> {
    let low = Version::parse(rest)?;
    let high = Version::parse(&format!("{}.{}.0", low.major(), low.minor() + 1)).expect("valid");
    Ok(VersionRangeSet::single(Interval::new(low, high)?))
}

fn explicit_range(s: &str) -> Result<VersionRangeSet, InvalidRangeError> {
    let mut low = None;
    let mut high = None;
    for part in s.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix(">=") {
            low = Some(Version::parse(rest.trim())?);
        } else if let Some(rest) = part.strip_prefix('<') {
            high = Some(Version::parse(rest.trim())?);
        } else {
            return Err(InvalidRangeError::MalformedShorthand(s.to_owned()));
        }
    }
    match (low, high) {
        (Some(low), Some(high)) => Ok(VersionRangeSet::single(Interval::new(low, high)?)),
        _ => Err(InvalidRangeError::MalformedShorthand(s.to_owned())),
    }
}

impl fmt::Display for VersionRangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|i| format!(">={},<{}", i.low, i.high))
            .collect();
        write!(f, "{}", parts.join(" || "))
    }
}

impl TryFrom<Vec<Interval>> for VersionRangeSet {
    type Error = InvalidRangeError;

    fn try_from(value: Vec<Interval>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VersionRangeSet> for Vec<Interval> {
    fn from(value: VersionRangeSet) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caret_excludes_next_major() {
        let r = VersionRangeSet::parse("^1.2.0").unwrap();
        assert!(r.contains(&Version::parse("1.2.0").unwrap()));
        assert!(r.contains(&Version::parse("1.9.9").unwrap()));
        assert!(!r.contains(&Version::parse("2.0.0").unwrap()));
    }

    #[test]
    fn explicit_bounds() {
        let r = VersionRangeSet::parse(">=1.2.0,<2.0.0").unwrap();
        assert!(r.contains(&Version::parse("1.2.0").unwrap()));
        assert!(!r.contains(&Version::parse("2.0.0").unwrap()));
    }

    #[test]
    fn rejects_empty_interval() {
        let low = Version::parse("2.0.0").unwrap();
        let high = Version::parse("1.0.0").unwrap();
        assert!(Interval::new(low, high).is_err());
    }
}
