//! Source discovery and classification within a library's source tree
//! (SPEC_FULL §4.F step 1).
//!
//! Convention (not stated explicitly in the source JSON, mirroring the
//! layout of every sdist in the example repository): a library's `path`
//! contains a private `src/` tree (scanned here) and a public `include/`
//! tree (consulted only by the usage-requirements aggregator).

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crucible_toolchain::Lang;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceKind {
    Lib,
    Test,
    App,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Path relative to the library's `src/` directory.
    pub relative_path: PathBuf,
    pub lang: LangTag,
    pub kind: SourceKind,
}

/// Thin `Ord`-able mirror of [`crucible_toolchain::Lang`] (which isn't
/// `Ord`/`Hash` since it's a small compiler-facing enum, not a sort key).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LangTag {
    C,
    Cxx,
}

impl From<LangTag> for Lang {
    fn from(tag: LangTag) -> Self {
        match tag {
            LangTag::C => Lang::C,
            LangTag::Cxx => Lang::Cxx,
        }
    }
}

const C_EXTENSIONS: &[&str] = &["c"];
const CXX_EXTENSIONS: &[&str] = &["cc", "cpp", "cxx", "cppm"];

fn classify_extension(ext: &str) -> Option<LangTag> {
    if C_EXTENSIONS.contains(&ext) {
        Some(LangTag::C)
    } else if CXX_EXTENSIONS.contains(&ext) {
        Some(LangTag::Cxx)
    } else {
        None
    }
}

fn classify_stem(stem: &str) -> SourceKind {
    if stem.contains(".test.") || stem.ends_with(".test") {
        SourceKind::Test
    } else if stem.contains(".main.") || stem.ends_with(".main") {
        SourceKind::App
    } else {
        SourceKind::Lib
    }
}

/// Scans `library_root/src` for compilable sources, lexicographically
/// ordered by relative path (SPEC_FULL §4.F determinism clause).
pub fn scan_sources(library_root: &Path) -> Result<Vec<SourceFile>> {
    let src_dir = library_root.join("src");
    if !src_dir.exists() {
        return Ok(Vec::new());
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(&src_dir) {
        let entry = entry.map_err(|err| Error::SourceScan {
            path: src_dir.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, err),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let Some(lang) = classify_extension(ext) else {
            continue;
        };
        let stem = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let kind = classify_stem(stem);
        let relative_path = path
            .strip_prefix(&src_dir)
            .expect("walkdir yields children of src_dir")
            .to_path_buf();
        sources.push(SourceFile { relative_path, lang, kind });
    }
    sources.sort();
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn classifies_lib_test_and_app_sources() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.cpp"), "").unwrap();
        fs::write(src.join("a.test.cpp"), "").unwrap();
        fs::write(src.join("main.main.cpp"), "").unwrap();
        fs::write(src.join("notes.txt"), "").unwrap();

        let sources = scan_sources(dir.path()).unwrap();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].relative_path, PathBuf::from("a.cpp"));
        assert_eq!(sources[0].kind, SourceKind::Lib);
        assert!(sources.iter().any(|s| s.kind == SourceKind::Test));
        assert!(sources.iter().any(|s| s.kind == SourceKind::App));
    }

    #[test]
    fn missing_src_dir_yields_no_sources() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_sources(dir.path()).unwrap().is_empty());
    }
}
