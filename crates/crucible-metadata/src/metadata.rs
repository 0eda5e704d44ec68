//! Top-level package metadata (spec §3.2, §4.A).

use serde_json::{Map, Value};

use crucible_foundation::{NameBuf, PkgId};

use crate::error::{Error, Result};
use crate::library::{require_object, LibraryInfo};

const SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct PackageMetadata {
    pub id: PkgId,
    pub libraries: Vec<LibraryInfo>,
    /// Unknown top-level fields, preserved verbatim (not interpreted).
    pub extra: Map<String, Value>,
}

impl PackageMetadata {
    /// Parses and fully validates a metadata document.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = require_object(value, "<root>")?;

        let schema_version = obj
            .get("schema-version")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::InvalidMetaData {
                message: "missing or non-integer field `schema-version`".into(),
            })?;
        if schema_version != SCHEMA_VERSION {
            return Err(Error::UnsupportedSchemaVersion {
                found: schema_version,
            });
        }

        let id_value = obj.get("id").ok_or_else(|| Error::InvalidMetaData {
            message: "missing field `id`".into(),
        })?;
        let id = parse_pkg_id(id_value)?;

        let libraries_value = obj.get("libraries").ok_or_else(|| Error::InvalidMetaData {
            message: "missing field `libraries`".into(),
        })?;
        let libraries_array = libraries_value
            .as_array()
            .ok_or_else(|| Error::InvalidMetaData {
                message: "field `libraries` must be an array".into(),
            })?;
        if libraries_array.is_empty() {
            return Err(Error::InvalidMetaData {
                message: "field `libraries` must be non-empty".into(),
            });
        }
        let libraries = libraries_array
            .iter()
            .enumerate()
            .map(|(i, v)| LibraryInfo::from_json(v, &format!("libraries[{i}]")))
            .collect::<Result<Vec<_>>>()?;

        let mut extra = Map::new();
        for (key, value) in obj {
            if !matches!(key.as_str(), "schema-version" | "id" | "libraries") {
                extra.insert(key.clone(), value.clone());
            }
        }

        let metadata = Self { id, libraries, extra };
        metadata.validate_invariants()?;
        Ok(metadata)
    }

    fn validate_invariants(&self) -> Result<()> {
        let sibling_names: std::collections::HashSet<&str> =
            self.libraries.iter().map(|l| l.name.as_str()).collect();
        for lib in &self.libraries {
            for using in lib.intra_using.iter().chain(lib.intra_test_using.iter()) {
                if !sibling_names.contains(using.as_str()) {
                    return Err(Error::InvalidMetaData {
                        message: format!(
                            "library `{}` declares intra-package use of `{}`, which is not a library in this package",
                            lib.name, using
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Serializes with a stable, canonical key order so that two logically
    /// equal metadata objects stringify byte-identically.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("schema-version".into(), Value::from(SCHEMA_VERSION));
        map.insert("id".into(), pkg_id_to_json(&self.id));
        map.insert(
            "libraries".into(),
            Value::Array(self.libraries.iter().map(LibraryInfo::to_json).collect()),
        );
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    pub fn to_canonical_string(&self) -> String {
        serde_json::to_string(&self.to_json()).expect("canonical JSON always serializes")
    }
}

fn parse_pkg_id(value: &Value) -> Result<PkgId> {
    let obj = require_object(value, "id")?;
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidMetaData {
            message: "id.name: missing or non-string".into(),
        })?;
    let version = obj
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidMetaData {
            message: "id.version: missing or non-string".into(),
        })?;
    let revision = obj
        .get("revision")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::InvalidMetaData {
            message: "id.revision: missing or non-integer".into(),
        })?;

    let name = NameBuf::new(name)?;
    let version = crucible_foundation::Version::parse(version)?;
    let revision = u32::try_from(revision).map_err(|_| Error::InvalidMetaData {
        message: format!("id.revision: {revision} out of range"),
    })?;
    if revision < 1 {
        return Err(Error::InvalidMetaData {
            message: "id.revision: must be >= 1 for anything stored in a repository".into(),
        });
    }
    Ok(PkgId::new(name, version, revision))
}

fn pkg_id_to_json(id: &PkgId) -> Value {
    let mut map = Map::new();
    map.insert("name".into(), Value::String(id.name.to_string()));
    map.insert("version".into(), Value::String(id.version.to_string()));
    map.insert("revision".into(), Value::from(id.revision));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "schema-version": 1,
            "id": {"name": "fmt", "version": "9.1.0", "revision": 1},
            "libraries": [
                {
                    "name": "fmt",
                    "path": "lib/fmt",
                    "intra_using": [],
                    "intra_test_using": [],
                    "dependencies": [],
                    "test_dependencies": []
                }
            ],
            "x-vendor-note": "kept verbatim"
        })
    }

    #[test]
    fn round_trip_to_json_and_back() {
        let parsed = PackageMetadata::from_json(&sample()).unwrap();
        let json = parsed.to_json();
        let reparsed = PackageMetadata::from_json(&json).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn preserves_unknown_top_level_fields() {
        let parsed = PackageMetadata::from_json(&sample()).unwrap();
        assert_eq!(
            parsed.extra.get("x-vendor-note").and_then(Value::as_str),
            Some("kept verbatim")
        );
    }

    #[test]
    fn rejects_wrong_schema_version() {
        let mut value = sample();
        value["schema-version"] = json!(2);
        let err = PackageMetadata::from_json(&value).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSchemaVersion { found: 2 }));
    }

    #[test]
    fn rejects_empty_libraries() {
        let mut value = sample();
        value["libraries"] = json!([]);
        assert!(PackageMetadata::from_json(&value).is_err());
    }

    #[test]
    fn rejects_dangling_intra_using() {
        let mut value = sample();
        value["libraries"][0]["intra_using"] = json!(["nonexistent"]);
        assert!(PackageMetadata::from_json(&value).is_err());
    }

    #[test]
    fn rejects_revision_below_one() {
        let mut value = sample();
        value["id"]["revision"] = json!(0);
        assert!(PackageMetadata::from_json(&value).is_err());
    }
}
