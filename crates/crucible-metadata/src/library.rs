//! Library and dependency descriptors (spec §3.2).

use serde_json::{Map, Value};

use crucible_foundation::{Interval, NameBuf, Version, VersionRangeSet};

use crate::error::{Error, Result};
use crate::hint::suggest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: NameBuf,
    pub acceptable_versions: VersionRangeSet,
    pub uses: Vec<NameBuf>,
}

const DEPENDENCY_FIELDS: &[&str] = &["name", "acceptable_versions", "uses"];

impl Dependency {
    pub fn from_json(value: &Value, context: &str) -> Result<Self> {
        let obj = require_object(value, context)?;
        reject_unknown_fields(obj, DEPENDENCY_FIELDS, context)?;

        let name = NameBuf::new(require_str(obj, "name", context)?)?;
        let versions_value = obj.get("acceptable_versions").ok_or_else(|| {
            Error::InvalidMetaData {
                message: format!("{context}: missing field `acceptable_versions`"),
            }
        })?;
        let acceptable_versions = parse_range_set(versions_value, context)?;
        let uses = match obj.get("uses") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| match v.as_str() {
                    Some(s) => NameBuf::new(s).map_err(Error::from),
                    None => Err(Error::InvalidMetaData {
                        message: format!("{context}.uses: expected string"),
                    }),
                })
                .collect::<Result<Vec<_>>>()?,
            Some(_) => {
                return Err(Error::InvalidMetaData {
                    message: format!("{context}.uses: expected array"),
                })
            }
            None => Vec::new(),
        };

        Ok(Self {
            name,
            acceptable_versions,
            uses,
        })
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".into(), Value::String(self.name.to_string()));
        map.insert(
            "acceptable_versions".into(),
            Value::Array(
                self.acceptable_versions
                    .intervals()
                    .iter()
                    .map(|i| {
                        Value::Array(vec![
                            Value::String(i.low.to_string()),
                            Value::String(i.high.to_string()),
                        ])
                    })
                    .collect(),
            ),
        );
        map.insert(
            "uses".into(),
            Value::Array(self.uses.iter().map(|n| Value::String(n.to_string())).collect()),
        );
        Value::Object(map)
    }
}

fn parse_range_set(value: &Value, context: &str) -> Result<VersionRangeSet> {
    match value {
        Value::String(s) => VersionRangeSet::parse(s).map_err(Error::from),
        Value::Array(items) => {
            let mut intervals = Vec::with_capacity(items.len());
            for item in items {
                let pair = item.as_array().ok_or_else(|| Error::InvalidMetaData {
                    message: format!("{context}.acceptable_versions: expected [low, high] pair"),
                })?;
                if pair.len() != 2 {
                    return Err(Error::InvalidMetaData {
                        message: format!("{context}.acceptable_versions: expected [low, high] pair"),
                    });
                }
                let low = Version::parse(pair[0].as_str().unwrap_or_default())?;
                let high = Version::parse(pair[1].as_str().unwrap_or_default())?;
                intervals.push(Interval::new(low, high)?);
            }
            VersionRangeSet::new(intervals).map_err(Error::from)
        }
        _ => Err(Error::InvalidMetaData {
            message: format!("{context}.acceptable_versions: expected string or array"),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryInfo {
    pub name: NameBuf,
    pub path: String,
    pub intra_using: Vec<NameBuf>,
    pub intra_test_using: Vec<NameBuf>,
    pub dependencies: Vec<Dependency>,
    pub test_dependencies: Vec<Dependency>,
}

const LIBRARY_FIELDS: &[&str] = &[
    "name",
    "path",
    "intra_using",
    "intra_test_using",
    "dependencies",
    "test_dependencies",
];

impl LibraryInfo {
    pub fn from_json(value: &Value, context: &str) -> Result<Self> {
        let obj = require_object(value, context)?;
        reject_unknown_fields(obj, LIBRARY_FIELDS, context)?;

        let name = NameBuf::new(require_str(obj, "name", context)?)?;
        let path = require_str(obj, "path", context)?.to_owned();
        validate_relative_path(&path, context)?;

        let intra_using = parse_name_list(obj, "intra_using", context)?;
        let intra_test_using = parse_name_list(obj, "intra_test_using", context)?;
        let dependencies = parse_dependency_list(obj, "dependencies", context)?;
        let test_dependencies = parse_dependency_list(obj, "test_dependencies", context)?;

        Ok(Self {
            name,
            path,
            intra_using,
            intra_test_using,
            dependencies,
            test_dependencies,
        })
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("name".into(), Value::String(self.name.to_string()));
        map.insert("path".into(), Value::String(self.path.clone()));
        map.insert("intra_using".into(), names_to_json(&self.intra_using));
        map.insert("intra_test_using".into(), names_to_json(&self.intra_test_using));
        map.insert(
            "dependencies".into(),
            Value::Array(self.dependencies.iter().map(Dependency::to_json).collect()),
        );
        map.insert(
            "test_dependencies".into(),
            Value::Array(self.test_dependencies.iter().map(Dependency::to_json).collect()),
        );
        Value::Object(map)
    }
}

fn names_to_json(names: &[NameBuf]) -> Value {
    Value::Array(names.iter().map(|n| Value::String(n.to_string())).collect())
}

fn parse_name_list(obj: &Map<String, Value>, field: &str, context: &str) -> Result<Vec<NameBuf>> {
    match obj.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| match v.as_str() {
                Some(s) => NameBuf::new(s).map_err(Error::from),
                None => Err(Error::InvalidMetaData {
                    message: format!("{context}.{field}: expected string"),
                }),
            })
            .collect(),
        Some(_) => Err(Error::InvalidMetaData {
            message: format!("{context}.{field}: expected array"),
        }),
        None => Ok(Vec::new()),
    }
}

fn parse_dependency_list(
    obj: &Map<String, Value>,
    field: &str,
    context: &str,
) -> Result<Vec<Dependency>> {
    match obj.get(field) {
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| Dependency::from_json(v, &format!("{context}.{field}[{i}]")))
            .collect(),
        Some(_) => Err(Error::InvalidMetaData {
            message: format!("{context}.{field}: expected array"),
        }),
        None => Ok(Vec::new()),
    }
}

fn validate_relative_path(path: &str, context: &str) -> Result<()> {
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(Error::InvalidMetaData {
            message: format!("{context}.path: must not be absolute, found `{path}`"),
        });
    }
    if std::path::Path::new(path)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(Error::InvalidMetaData {
            message: format!("{context}.path: must not escape the package root, found `{path}`"),
        });
    }
    Ok(())
}

pub(crate) fn require_object<'a>(value: &'a Value, context: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| Error::InvalidMetaData {
        message: format!("{context}: expected a JSON object"),
    })
}

pub(crate) fn require_str<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
    context: &str,
) -> Result<&'a str> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidMetaData {
            message: format!("{context}: missing or non-string field `{field}`"),
        })
}

pub(crate) fn reject_unknown_fields(
    obj: &Map<String, Value>,
    known: &'static [&'static str],
    context: &str,
) -> Result<()> {
    for key in obj.keys() {
        if !known.contains(&key.as_str()) {
            return Err(Error::UnknownField {
                field: key.clone(),
                context: context.to_owned(),
                suggestion: suggest(key, known),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn library_json() -> Value {
        json!({
            "name": "core",
            "path": "lib/core",
            "intra_using": [],
            "intra_test_using": [],
            "dependencies": [
                {"name": "fmt", "acceptable_versions": "^9.0.0", "uses": ["fmt"]}
            ],
            "test_dependencies": []
        })
    }

    #[test]
    fn parses_valid_library() {
        let lib = LibraryInfo::from_json(&library_json(), "libraries[0]").unwrap();
        assert_eq!(lib.name.to_string(), "core");
        assert_eq!(lib.dependencies.len(), 1);
    }

    #[test]
    fn rejects_unknown_field_with_hint() {
        let mut value = library_json();
        let obj = value.as_object_mut().unwrap();
        let path = obj.remove("path").unwrap();
        obj.insert("pathh".to_string(), path);
        let err = LibraryInfo::from_json(&value, "libraries[0]").unwrap_err();
        match err {
            Error::UnknownField { suggestion, .. } => assert_eq!(suggestion, Some("path")),
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn rejects_absolute_path() {
        let mut value = library_json();
        value["path"] = json!("/etc/core");
        assert!(LibraryInfo::from_json(&value, "libraries[0]").is_err());
    }

    #[test]
    fn rejects_escaping_path() {
        let mut value = library_json();
        value["path"] = json!("../escape");
        assert!(LibraryInfo::from_json(&value, "libraries[0]").is_err());
    }
}
