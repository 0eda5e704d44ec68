//! Validated package/library names (spec §3.1).

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Why a candidate string failed to validate as a [`Name`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    #[error("name must not be empty")]
    Empty,
    #[error("name `{0}` must start and end with an alphanumeric character")]
    LeadingOrTrailingPunctuation(String),
    #[error("name `{0}` has two adjacent punctuation characters at index {1}")]
    AdjacentPunctuation(String, usize),
    #[error("name `{0}` contains an invalid character `{1}` at index {2}")]
    InvalidCharacter(String, char, usize),
}

fn is_punctuation(c: char) -> bool {
    matches!(c, '_' | '.' | '-')
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || is_punctuation(c)
}

/// Validates `s` against the name grammar, without allocating.
///
/// Grammar: non-empty; starts/ends with an alphanumeric character; every
/// character is in `[A-Za-z0-9_.-]`; no two adjacent punctuation characters.
pub fn validate_name(s: &str) -> Result<(), InvalidNameError> {
    let mut chars = s.char_indices().peekable();
    let Some(&(_, first)) = chars.peek() else {
        return Err(InvalidNameError::Empty);
    };
    if !first.is_ascii_alphanumeric() {
        return Err(InvalidNameError::LeadingOrTrailingPunctuation(s.to_owned()));
    }
    let mut prev_punct = false;
    let mut last = first;
    for (i, c) in chars {
        if !is_allowed(c) {
            return Err(InvalidNameError::InvalidCharacter(s.to_owned(), c, i));
        }
        if is_punctuation(c) && prev_punct {
            return Err(InvalidNameError::AdjacentPunctuation(s.to_owned(), i));
        }
        prev_punct = is_punctuation(c);
        last = c;
    }
    if !last.is_ascii_alphanumeric() {
        return Err(InvalidNameError::LeadingOrTrailingPunctuation(s.to_owned()));
    }
    Ok(())
}

/// A borrowed, validated package or library name.
///
/// Always constructed through [`Name::new`] (or the owned [`NameBuf`]), so
/// any `&Name` in scope is known to satisfy [`validate_name`].
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Name(str);

impl Name {
    pub fn new(s: &str) -> Result<&Name, InvalidNameError> {
        validate_name(s)?;
        // SAFETY: `Name` is `#[repr(transparent)]` over `str` and we just validated `s`.
        Ok(unsafe { &*(s as *const str as *const Name) })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToOwned for Name {
    type Owned = NameBuf;

    fn to_owned(&self) -> NameBuf {
        NameBuf(self.0.to_owned())
    }
}

/// An owned, validated package or library name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NameBuf(String);

impl NameBuf {
    pub fn new(s: impl Into<String>) -> Result<Self, InvalidNameError> {
        let s = s.into();
        validate_name(&s)?;
        Ok(Self(s))
    }

    pub fn as_name(&self) -> &Name {
        // SAFETY: the inner `String` was validated in `new`.
        unsafe { &*(self.0.as_str() as *const str as *const Name) }
    }
}

impl Deref for NameBuf {
    type Target = Name;

    fn deref(&self) -> &Name {
        self.as_name()
    }
}

impl Borrow<Name> for NameBuf {
    fn borrow(&self) -> &Name {
        self.as_name()
    }
}

impl fmt::Display for NameBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NameBuf {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NameBuf {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NameBuf> for String {
    fn from(value: NameBuf) -> Self {
        value.0
    }
}

impl PartialEq<str> for NameBuf {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("fmt")]
    #[case("a")]
    #[case("a.b-c_d")]
    #[case("lib9")]
    fn valid_names(#[case] s: &str) {
        assert_eq!(Name::new(s).unwrap().as_str(), s);
    }

    #[rstest]
    #[case("", InvalidNameError::Empty)]
    #[case("-foo", InvalidNameError::LeadingOrTrailingPunctuation("-foo".into()))]
    #[case("foo-", InvalidNameError::LeadingOrTrailingPunctuation("foo-".into()))]
    #[case("a--b", InvalidNameError::AdjacentPunctuation("a--b".into(), 2))]
    #[case("a b", InvalidNameError::InvalidCharacter("a b".into(), ' ', 1))]
    fn invalid_names(#[case] s: &str, #[case] expected: InvalidNameError) {
        assert_eq!(Name::new(s).unwrap_err(), expected);
    }

    #[test]
    fn round_trip_through_name_buf() {
        let buf = NameBuf::new("my-lib.core").unwrap();
        assert_eq!(buf.as_name().as_str(), "my-lib.core");
        assert_eq!(buf.to_string(), "my-lib.core");
    }
}
