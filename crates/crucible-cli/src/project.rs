//! Loads the project's own package manifest and toolchain description from
//! disk (§6.2): the driver-glue half of "parses CLI, loads config/toolchain".

use std::path::Path;

use crucible_metadata::PackageMetadata;
use crucible_toolchain::Toolchain;

use crate::error::{CliError, Result};

/// Reads the project manifest at `dir`, trying `pkg.json`, `pkg.yaml`, then
/// `project.json` in that order (§6.2's "pkg.json or project's pkg.yaml/
/// project.json equivalent" — all three share the same schema, §3.2).
pub fn load_project_manifest(dir: &Path) -> Result<PackageMetadata> {
    for (filename, is_yaml) in [("pkg.json", false), ("pkg.yaml", true), ("project.json", false)] {
        let path = dir.join(filename);
        if !path.exists() {
            continue;
        }
        let raw = std::fs::read_to_string(&path)?;
        let value: serde_json::Value = if is_yaml {
            serde_yaml::from_str(&raw)?
        } else {
            serde_json::from_str(&raw)?
        };
        return Ok(PackageMetadata::from_json(&value)?);
    }
    Err(CliError::MissingProjectManifest(dir.to_owned()))
}

/// Loads a toolchain description from an explicit path, falling back to
/// `crucible-config`'s `toolchain` setting (itself backed by
/// `CRUCIBLE_TOOLCHAIN` / a config file) when no path is given on the
/// command line.
pub fn load_toolchain(explicit: Option<&Path>) -> Result<Toolchain> {
    let path = match explicit {
        Some(path) => path.to_owned(),
        None => {
            let config = crucible_config::Config::current()?;
            match &config.toolchain {
                Some(path) => std::path::PathBuf::from(path),
                None => {
                    return Err(CliError::UserError(
                        "no toolchain specified: pass --toolchain or set CRUCIBLE_TOOLCHAIN".into(),
                    ))
                }
            }
        }
    };
    let raw = std::fs::read_to_string(&path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    Ok(Toolchain::from_json(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> serde_json::Value {
        serde_json::json!({
            "schema-version": 1,
            "id": {"name": "fmt", "version": "9.1.0", "revision": 1},
            "libraries": [{
                "name": "fmt",
                "path": "lib/fmt",
                "intra_using": [],
                "intra_test_using": [],
                "dependencies": [],
                "test_dependencies": [],
            }],
        })
    }

    #[test]
    fn loads_pkg_json_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pkg.json"), sample_manifest().to_string()).unwrap();
        let manifest = load_project_manifest(dir.path()).unwrap();
        assert_eq!(manifest.id.name.as_str(), "fmt");
    }

    #[test]
    fn falls_back_to_pkg_yaml_then_project_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = serde_yaml::to_string(&sample_manifest()).unwrap();
        std::fs::write(dir.path().join("pkg.yaml"), yaml).unwrap();
        let manifest = load_project_manifest(dir.path()).unwrap();
        assert_eq!(manifest.id.name.as_str(), "fmt");
    }

    #[test]
    fn missing_manifest_is_a_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_project_manifest(dir.path()).unwrap_err();
        assert!(matches!(err, CliError::MissingProjectManifest(_)));
    }
}
