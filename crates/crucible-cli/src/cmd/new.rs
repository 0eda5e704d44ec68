//! `new`: scaffold a project directory with a `pkg.json` manifest and a
//! starter library (SPEC_FULL §6.1). Grounded on the original `new`
//! command's directory layout and placeholder source, made
//! non-interactive for scripted use.

use std::path::PathBuf;

use clap::Args;

use crate::cli::{GlobalArgs, Run};
use crate::error::{CliError, Result};

#[derive(Args, Debug)]
pub struct NewCmd {
    pub name: String,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Split headers into `include/<name>/` instead of `src/<name>/`.
    #[arg(long)]
    pub split_src_include: bool,
}

fn to_ident(name: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    ident
}

impl Run for NewCmd {
    fn run(&self, _global: &GlobalArgs) -> Result<i32> {
        crucible_foundation::NameBuf::new(&self.name).map_err(|e| CliError::UserError(e.to_string()))?;

        let project_dir = self.dir.clone().unwrap_or_else(|| PathBuf::from(&self.name));
        if project_dir.exists() {
            if !project_dir.is_dir() {
                return Err(CliError::UserError(format!(
                    "{} names an existing non-directory file",
                    project_dir.display()
                )));
            }
            if project_dir.read_dir()?.next().is_some() {
                return Err(CliError::UserError(format!(
                    "{} is an existing non-empty directory",
                    project_dir.display()
                )));
            }
        }
        std::fs::create_dir_all(&project_dir)?;

        let manifest = serde_json::json!({
            "schema-version": 1,
            "id": {"name": self.name, "version": "0.1.0", "revision": 1},
            "libraries": [{
                "name": self.name,
                "path": format!("lib/{}", self.name),
                "intra_using": [],
                "intra_test_using": [],
                "dependencies": [],
                "test_dependencies": [],
            }],
        });
        std::fs::write(project_dir.join("pkg.json"), serde_json::to_string_pretty(&manifest)?)?;

        let lib_dir = project_dir.join("lib").join(&self.name);
        let header_dir = if self.split_src_include {
            lib_dir.join("include")
        } else {
            lib_dir.join("src")
        };
        let src_dir = lib_dir.join("src");
        std::fs::create_dir_all(header_dir.join(&self.name))?;
        std::fs::create_dir_all(src_dir.join(&self.name))?;

        let ident = to_ident(&self.name);
        std::fs::write(
            src_dir.join(&self.name).join(format!("{}.cpp", self.name)),
            format!(
                "#include <{0}/{0}.hpp>\n\nint {1}::the_answer() noexcept {{\n  return 42;\n}}\n",
                self.name, ident
            ),
        )?;
        std::fs::write(
            header_dir.join(&self.name).join(format!("{}.hpp", self.name)),
            format!(
                "#pragma once\n\nnamespace {0} {{\n\nint the_answer() noexcept;\n\n}}\n",
                ident
            ),
        )?;

        println!("new project files written to {}", project_dir.display());
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_ident_replaces_non_alphanumerics() {
        assert_eq!(to_ident("fmt-lib"), "fmt_lib");
        assert_eq!(to_ident("my.pkg"), "my_pkg");
    }

    #[test]
    fn to_ident_prefixes_leading_digit() {
        assert_eq!(to_ident("9lives"), "_9lives");
    }
}
