//! Parses compiler-emitted dependency information so a header-only
//! change busts a compile node's cache (SPEC_FULL §4.G, §3.6 `deps_list`).

use std::path::{Path, PathBuf};

use crucible_build::DepsMode;

/// Returns the header paths a compile depended on: read from the GNU
/// `.d` Makefile fragment, or parsed out of MSVC's `/showIncludes`
/// stdout, per `mode`. Anything unreadable or unparseable yields an
/// empty list; the source file's own hash still guards correctness,
/// just without header-level granularity.
pub fn parse(mode: DepsMode, dep_file: Option<&Path>, stdout: &str) -> Vec<PathBuf> {
    match mode {
        DepsMode::Gnu => dep_file
            .and_then(|p| std::fs::read_to_string(p).ok())
            .map(|s| parse_gnu(&s))
            .unwrap_or_default(),
        DepsMode::Msvc => parse_msvc_show_includes(stdout),
        DepsMode::None => Vec::new(),
    }
}

/// A GNU dep-file is a Makefile rule, `target: dep1 dep2 \`, with
/// backslash-newline line continuations and deps separated by
/// unescaped whitespace. The first token after `:` is usually the
/// source file itself; callers don't care, it's already covered by
/// `source` in `fingerprint::hash_inputs`.
fn parse_gnu(contents: &str) -> Vec<PathBuf> {
    let joined = contents.replace("\\\n", " ").replace("\\\r\n", " ");
    let mut deps = Vec::new();
    for line in joined.lines() {
        let Some((_, rest)) = line.split_once(':') else { continue };
        deps.extend(rest.split_whitespace().map(PathBuf::from));
    }
    deps
}

/// MSVC's `/showIncludes` writes one line per included header to
/// stdout, e.g. `Note: including file:   C:\foo\bar.h` (leading spaces
/// track nesting depth, ignored here).
fn parse_msvc_show_includes(stdout: &str) -> Vec<PathBuf> {
    const MARKER: &str = "Note: including file:";
    stdout
        .lines()
        .filter_map(|line| line.split_once(MARKER))
        .map(|(_, path)| PathBuf::from(path.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gnu_depfile_with_continuations() {
        let d = "a.o: a.c \\\n  a.h \\\n  b.h\n";
        let deps = parse_gnu(d);
        assert_eq!(deps, vec![PathBuf::from("a.c"), PathBuf::from("a.h"), PathBuf::from("b.h")]);
    }

    #[test]
    fn parses_msvc_show_includes_stdout_and_ignores_other_lines() {
        let out = "a.cpp\nNote: including file:   C:\\inc\\a.h\nNote: including file:    C:\\inc\\b.h\nwarning: unused variable\n";
        let deps = parse_msvc_show_includes(out);
        assert_eq!(deps, vec![PathBuf::from("C:\\inc\\a.h"), PathBuf::from("C:\\inc\\b.h")]);
    }

    #[test]
    fn none_mode_yields_no_deps_regardless_of_stdout() {
        assert!(parse(DepsMode::None, None, "Note: including file:   x.h").is_empty());
    }

    #[test]
    fn gnu_mode_with_missing_dep_file_yields_empty_not_error() {
        assert!(parse(DepsMode::Gnu, Some(Path::new("/nonexistent/a.o.d")), "").is_empty());
    }
}
