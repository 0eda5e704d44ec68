//! CLI-facing dependency shorthand: `name[@version-range][+lib1,lib2]`
//! (SPEC_FULL §9.1), e.g. `fmt@^9.0.0+fmt`.

use nom::bytes::complete::take_till1;
use nom::character::complete::char;
use nom::combinator::{eof, opt};
use nom::multi::separated_list1;
use nom::sequence::preceded;
use nom::IResult;

use crucible_foundation::{NameBuf, VersionRangeSet};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyShorthand {
    pub name: String,
    pub version_range: Option<String>,
    pub uses: Vec<String>,
}

fn is_name_char(c: char) -> bool {
    c != '@' && c != '+' && !c.is_whitespace()
}

fn is_range_char(c: char) -> bool {
    c != '+' && !c.is_whitespace()
}

fn parse_shorthand(input: &str) -> IResult<&str, DependencyShorthand> {
    let (input, name) = take_till1(|c| !is_name_char(c))(input)?;
    let (input, version_range) = opt(preceded(char('@'), take_till1(|c| !is_range_char(c))))(input)?;
    let (input, uses) = opt(preceded(
        char('+'),
        separated_list1(char(','), take_till1(|c| c == ',' || c.is_whitespace())),
    ))(input)?;
    let (input, _) = eof(input)?;
    Ok((
        input,
        DependencyShorthand {
            name: name.to_owned(),
            version_range: version_range.map(str::to_owned),
            uses: uses
                .unwrap_or_default()
                .into_iter()
                .map(str::to_owned)
                .collect(),
        },
    ))
}

impl DependencyShorthand {
    pub fn parse(s: &str) -> Result<Self> {
        let (_, parsed) =
            parse_shorthand(s).map_err(|_| Error::MalformedShorthand(s.to_owned()))?;
        // Validate the pieces eagerly so callers get a typed error, not a
        // deferred failure the first time the shorthand is resolved.
        NameBuf::new(&parsed.name)?;
        if let Some(range) = &parsed.version_range {
            VersionRangeSet::parse(range)?;
        }
        for lib in &parsed.uses {
            NameBuf::new(lib)?;
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_only() {
        let s = DependencyShorthand::parse("fmt").unwrap();
        assert_eq!(s.name, "fmt");
        assert_eq!(s.version_range, None);
        assert!(s.uses.is_empty());
    }

    #[test]
    fn parses_full_shorthand() {
        let s = DependencyShorthand::parse("fmt@^9.0.0+fmt,fmt-test").unwrap();
        assert_eq!(s.name, "fmt");
        assert_eq!(s.version_range.as_deref(), Some("^9.0.0"));
        assert_eq!(s.uses, vec!["fmt", "fmt-test"]);
    }

    #[test]
    fn rejects_invalid_name() {
        assert!(DependencyShorthand::parse("-fmt@^9.0.0").is_err());
    }
}
