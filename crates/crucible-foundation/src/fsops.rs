//! Atomic filesystem publication helpers (spec §5).
//!
//! Renames must be atomic on the local filesystem; if the rename would
//! cross devices, fall back to copy-then-rename-then-delete of the source
//! so that readers never observe a half-moved destination.

use std::fs;
use std::path::Path;

/// Moves `from` to `to` atomically when possible, falling back to a
/// recursive copy plus delete when `from` and `to` live on different
/// filesystems (detected via the rename's `EXDEV` failure).
pub fn atomic_move(from: &Path, to: &Path) -> std::io::Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    const EXDEV: i32 = 18;
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) if err.raw_os_error() == Some(EXDEV) => {
            copy_then_delete(from, to)?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn copy_then_delete(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.is_dir() {
        copy_dir_recursive(from, to)?;
        fs::remove_dir_all(from)?;
    } else {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

fn copy_dir_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Stages content under a sibling temp directory so it can be atomically
/// published with [`atomic_move`], and is cleaned up on drop if it was
/// never consumed.
pub struct StagingDir {
    dir: tempfile::TempDir,
}

impl StagingDir {
    pub fn new_in(parent: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(parent)?;
        Ok(Self {
            dir: tempfile::Builder::new().prefix(".staging-").tempdir_in(parent)?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Consumes the staging dir, publishing it at `dest` atomically.
    pub fn publish(self, dest: &Path) -> std::io::Result<()> {
        let path = self.dir.into_path();
        atomic_move(&path, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_move_renames_within_same_filesystem() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src.txt");
        fs::write(&src, b"hello").unwrap();
        let dst = tmp.path().join("nested/dst.txt");
        atomic_move(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "hello");
    }

    #[test]
    fn staging_dir_publishes_atomically() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingDir::new_in(tmp.path()).unwrap();
        fs::write(staging.path().join("pkg.json"), b"{}").unwrap();
        let dest = tmp.path().join("pkg/fmt/9.1.0~1");
        staging.publish(&dest).unwrap();
        assert!(dest.join("pkg.json").exists());
    }
}
