//! Command/inputs hashing for incremental rebuild (spec §4.G step 2) and
//! the tweaks-dir cache-buster (spec §4.H).

use std::path::{Path, PathBuf};

use crucible_foundation::digest::{djb2, Hasher};

use crate::error::Result;

pub fn hash_command(command: &[String]) -> String {
    let mut hasher = Hasher::<std::io::Sink>::new(None);
    for arg in command {
        use std::io::Write;
        let _ = hasher.write_all(arg.as_bytes());
        let _ = hasher.write_all(b"\x1f");
    }
    hasher.digest().to_string()
}

/// Hashes the source file plus every dependency-file path's mtime, so a
/// touched header busts the cache without reading its contents.
pub fn hash_inputs(source: &Path, deps: &[PathBuf]) -> Result<String> {
    use std::io::Write;
    let mut hasher = Hasher::<std::io::Sink>::new(None);
    let mut all: Vec<&Path> = std::iter::once(source).chain(deps.iter().map(PathBuf::as_path)).collect();
    all.sort();
    for path in all {
        let mtime = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let _ = hasher.write_all(path.to_string_lossy().as_bytes());
        let _ = hasher.write_all(mtime.to_string().as_bytes());
        let _ = hasher.write_all(b"\x1f");
    }
    Ok(hasher.digest().to_string())
}

/// Computes the tweaks-dir cache-buster: sort weakly-canonicalized
/// (forward-slash, relative) paths and run djb2 over their bytes.
pub fn tweaks_dir_digest(tweaks_dir: Option<&Path>) -> Result<u64> {
    let empty: Vec<String> = Vec::new();
    let Some(dir) = tweaks_dir else {
        return Ok(djb2(&empty));
    };
    if !dir.exists() {
        return Ok(djb2(&empty));
    }
    let mut relpaths: Vec<String> = Vec::new();
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        relpaths.push(rel.to_string_lossy().replace('\\', "/"));
    }
    relpaths.sort();
    Ok(djb2(&relpaths))
}
