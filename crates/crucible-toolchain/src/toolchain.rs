use serde_json::Value;

use crate::compiler::{CompilerId, DepsMode};
use crate::error::{Error, Result};
use crate::parse::{self, RawToolchain};
use crate::template::{lower, Substitutions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    C,
    Cxx,
}

/// A fully-derived toolchain: every field that the raw JSON document left
/// implicit has been resolved to a concrete default (SPEC_FULL §4.E).
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub compiler_id: Option<CompilerId>,
    pub c_compiler: String,
    pub cxx_compiler: String,
    pub compiler_launcher: Vec<String>,
    pub c_version: Option<String>,
    pub cxx_version: Option<String>,
    pub deps_mode: DepsMode,

    c_flags: Vec<String>,
    cxx_flags: Vec<String>,
    common_flags: Vec<String>,
    link_flags: Vec<String>,
    base_flags: Vec<String>,
    base_c_flags: Vec<String>,
    base_cxx_flags: Vec<String>,
    base_warning_flags: Vec<String>,
    runtime_flags_c: Vec<String>,
    runtime_flags_cxx: Vec<String>,
    runtime_link_flags: Vec<String>,
    optim_flags: Vec<String>,
    debug_flags: Vec<String>,
    lang_version_flag_template: String,

    pub include_template: Vec<String>,
    pub external_include_template: Vec<String>,
    pub define_template: Vec<String>,

    c_compile_file: Vec<String>,
    cxx_compile_file: Vec<String>,
    create_archive: Vec<String>,
    link_executable: Vec<String>,

    pub tty_flags: Vec<String>,
    pub c_source_type_flags: Vec<String>,
    pub cxx_source_type_flags: Vec<String>,
    pub syntax_only_flags: Vec<String>,
    pub consider_env: Vec<String>,

    pub obj_prefix: String,
    pub obj_suffix: String,
    pub archive_prefix: String,
    pub archive_suffix: String,
    pub exe_prefix: String,
    pub exe_suffix: String,
}

impl Toolchain {
    pub fn from_json(value: &Value) -> Result<Self> {
        Self::from_raw(parse::parse(value)?)
    }

    fn from_raw(raw: RawToolchain) -> Result<Self> {
        let id = raw.compiler_id;
        let gnu_like = id.map(CompilerId::is_gnu_like).unwrap_or(false);
        let msvc = id.map(CompilerId::is_msvc).unwrap_or(false);

        let c_compiler = raw.c_compiler.unwrap_or_else(|| default_c_compiler(id));
        let cxx_compiler = raw.cxx_compiler.unwrap_or_else(|| default_cxx_compiler(id));

        let deps_mode = match raw.advanced.deps_mode {
            Some(s) => DepsMode::parse(&s)?,
            None => DepsMode::default_for(id),
        };

        let lang_version_flag_template = raw.advanced.lang_version_flag_template.unwrap_or_else(|| {
            if msvc {
                "/std:[version]".to_string()
            } else {
                "-std=[version]".to_string()
            }
        });

        let include_template = raw.advanced.include_template.unwrap_or_else(|| {
            if msvc {
                vec!["/I".into(), "[path]".into()]
            } else {
                vec!["-I".into(), "[path]".into()]
            }
        });
        let external_include_template = raw
            .advanced
            .external_include_template
            .unwrap_or_else(|| if gnu_like { vec!["-isystem".into(), "[path]".into()] } else { include_template.clone() });
        let define_template = raw.advanced.define_template.unwrap_or_else(|| {
            if msvc {
                vec!["/D".into(), "[def]".into()]
            } else {
                vec!["-D".into(), "[def]".into()]
            }
        });

        let archive_prefix = raw.advanced.archive_prefix.unwrap_or_else(|| "lib".to_string());
        let archive_suffix = raw
            .advanced
            .archive_suffix
            .unwrap_or_else(|| if msvc { ".lib".to_string() } else { ".a".to_string() });
        let obj_prefix = raw.advanced.obj_prefix.unwrap_or_default();
        let obj_suffix = raw
            .advanced
            .obj_suffix
            .unwrap_or_else(|| if msvc { ".obj".to_string() } else { ".o".to_string() });
        let exe_prefix = raw.advanced.exe_prefix.unwrap_or_default();
        let exe_suffix = raw.advanced.exe_suffix.unwrap_or_default();

        let mut base_warning_flags = if msvc {
            vec!["/W4".to_string()]
        } else {
            vec!["-Wall".into(), "-Wextra".into(), "-Wpedantic".into(), "-Wconversion".into()]
        };
        if let Some(extra) = raw.advanced.base_warning_flags {
            base_warning_flags = extra;
        }
        let mut warning_flags = base_warning_flags.clone();
        if let Some(extra) = raw.warning_flags {
            warning_flags.extend(extra);
        }

        let base_flags = raw.advanced.base_flags.unwrap_or_else(|| {
            if msvc {
                vec!["/nologo".into(), "/permissive-".into()]
            } else {
                vec!["-fPIC".into(), "-pthread".into()]
            }
        });
        let base_c_flags = raw.advanced.base_c_flags.unwrap_or_default();
        let base_cxx_flags = raw.advanced.base_cxx_flags.unwrap_or_else(|| {
            if msvc {
                vec!["/EHsc".to_string()]
            } else {
                Vec::new()
            }
        });

        let optimize = raw.optimize.unwrap_or(false);
        let optim_flags = if optimize {
            if msvc {
                vec!["/O2".to_string()]
            } else {
                vec!["-O2".to_string()]
            }
        } else {
            Vec::new()
        };

        let debug = raw.debug.unwrap_or(crate::compiler::DebugSetting::Bool(false));
        let debug_flags = if !debug.wants_debug_info() {
            Vec::new()
        } else if msvc {
            vec!["/Z7".to_string()]
        } else if debug.is_split() {
            vec!["-g".into(), "-gsplit-dwarf".into()]
        } else {
            vec!["-g".to_string()]
        };

        let runtime_static = raw.runtime_static.unwrap_or(true);
        let runtime_debug = raw.runtime_debug.unwrap_or_else(|| debug.wants_debug_info());

        let (runtime_flags_c, runtime_flags_cxx, runtime_link_flags) = if msvc {
            let mut suffix = if runtime_static { "T" } else { "D" }.to_string();
            if runtime_debug {
                suffix.push('d');
            }
            let flag = format!("/M{suffix}");
            (vec![flag.clone()], vec![flag.clone()], vec![flag])
        } else if gnu_like {
            let mut flags = Vec::new();
            if runtime_static {
                flags.push("-static-libgcc".to_string());
                flags.push("-static-libstdc++".to_string());
            }
            if runtime_debug {
                flags.push("-D_GLIBCXX_DEBUG".to_string());
                flags.push("-D_LIBCPP_DEBUG=1".to_string());
            }
            (flags.clone(), flags.clone(), if runtime_static { vec!["-static-libgcc".into(), "-static-libstdc++".into()] } else { Vec::new() })
        } else {
            (Vec::new(), Vec::new(), Vec::new())
        };

        let tty_flags = raw.advanced.tty_flags.unwrap_or_else(|| {
            if gnu_like {
                vec!["-fdiagnostics-color".to_string()]
            } else {
                Vec::new()
            }
        });

        let c_source_type_flags = raw.advanced.c_source_type_flags.unwrap_or_else(|| {
            if msvc {
                vec!["/TC".to_string()]
            } else {
                vec!["-xc".to_string()]
            }
        });
        let cxx_source_type_flags = raw.advanced.cxx_source_type_flags.unwrap_or_else(|| {
            if msvc {
                vec!["/TP".to_string()]
            } else {
                vec!["-xc++".to_string()]
            }
        });
        let syntax_only_flags = raw.advanced.syntax_only_flags.unwrap_or_else(|| {
            if msvc {
                vec!["/Zs".to_string()]
            } else {
                vec!["-fsyntax-only".to_string()]
            }
        });
        let consider_env = raw.advanced.consider_env.unwrap_or_else(|| {
            if msvc {
                vec!["CL".into(), "_CL_".into(), "INCLUDE".into(), "LIBPATH".into(), "LIB".into()]
            } else {
                Vec::new()
            }
        });

        let c_compile_file = raw.advanced.c_compile_file.unwrap_or_else(|| default_compile_template(msvc));
        let cxx_compile_file = raw.advanced.cxx_compile_file.unwrap_or_else(|| default_compile_template(msvc));

        let create_archive = raw.advanced.create_archive.unwrap_or_else(|| {
            if msvc {
                vec!["lib".into(), "/nologo".into(), "/OUT:[out]".into(), "[in]".into()]
            } else {
                vec!["ar".into(), "rcs".into(), "[out]".into(), "[in]".into()]
            }
        });

        let link_executable = raw.advanced.link_executable.unwrap_or_else(|| {
            if msvc {
                vec!["[flags]".into(), "/nologo".into(), "/EHsc".into(), "[in]".into(), "/Fe[out]".into()]
            } else {
                vec!["[flags]".into(), "-fPIC".into(), "[in]".into(), "-pthread".into(), "-o[out]".into()]
            }
        });

        Ok(Toolchain {
            compiler_id: id,
            c_compiler,
            cxx_compiler,
            compiler_launcher: raw.compiler_launcher.unwrap_or_default(),
            c_version: raw.c_version,
            cxx_version: raw.cxx_version,
            deps_mode,
            c_flags: raw.c_flags.unwrap_or_default(),
            cxx_flags: raw.cxx_flags.unwrap_or_default(),
            common_flags: raw.common_flags.unwrap_or_default(),
            link_flags: raw.link_flags.unwrap_or_default(),
            base_flags,
            base_c_flags,
            base_cxx_flags,
            base_warning_flags: warning_flags,
            runtime_flags_c,
            runtime_flags_cxx,
            runtime_link_flags,
            optim_flags,
            debug_flags,
            lang_version_flag_template,
            include_template,
            external_include_template,
            define_template,
            c_compile_file,
            cxx_compile_file,
            create_archive,
            link_executable,
            tty_flags,
            c_source_type_flags,
            cxx_source_type_flags,
            syntax_only_flags,
            consider_env,
            obj_prefix,
            obj_suffix,
            archive_prefix,
            archive_suffix,
            exe_prefix,
            exe_suffix,
        })
    }

    pub fn compiler_for(&self, lang: Lang) -> &str {
        match lang {
            Lang::C => &self.c_compiler,
            Lang::Cxx => &self.cxx_compiler,
        }
    }

    pub fn warning_flags(&self) -> &[String] {
        &self.base_warning_flags
    }

    /// Assembles flags in the order: runtime, optimize, debug, common,
    /// language-specific, language-version, base (SPEC_FULL §4.E).
    pub fn compile_flags(&self, lang: Lang) -> Vec<String> {
        self.compile_flags_inner(lang, true)
    }

    /// Same as [`Toolchain::compile_flags`] but omitting the warning flags,
    /// for `--no-warnings` builds (SPEC_FULL §6.1).
    pub fn compile_flags_no_warnings(&self, lang: Lang) -> Vec<String> {
        self.compile_flags_inner(lang, false)
    }

    fn compile_flags_inner(&self, lang: Lang, warnings: bool) -> Vec<String> {
        let mut flags = Vec::new();
        match lang {
            Lang::C => flags.extend(self.runtime_flags_c.iter().cloned()),
            Lang::Cxx => flags.extend(self.runtime_flags_cxx.iter().cloned()),
        }
        flags.extend(self.optim_flags.iter().cloned());
        flags.extend(self.debug_flags.iter().cloned());
        if warnings {
            flags.extend(self.base_warning_flags.iter().cloned());
        }
        flags.extend(self.common_flags.iter().cloned());

        let (lang_flags, base_lang_flags, version) = match lang {
            Lang::C => (&self.c_flags, &self.base_c_flags, &self.c_version),
            Lang::Cxx => (&self.cxx_flags, &self.base_cxx_flags, &self.cxx_version),
        };
        flags.extend(lang_flags.iter().cloned());
        if let Some(version) = version {
            flags.push(self.lang_version_flag_template.replace("[version]", version));
        }
        flags.extend(self.base_flags.iter().cloned());
        flags.extend(base_lang_flags.iter().cloned());
        flags
    }

    pub fn link_flags(&self) -> Vec<String> {
        let mut flags = self.runtime_link_flags.clone();
        flags.extend(self.optim_flags.iter().cloned());
        flags.extend(self.debug_flags.iter().cloned());
        flags.extend(self.link_flags.iter().cloned());
        flags
    }

    pub fn compile_command(&self, lang: Lang, input: &str, output: &str) -> Vec<String> {
        self.compile_command_with_flags(lang, input, output, &self.compile_flags(lang))
    }

    /// Lowers a compile command using a caller-supplied, already-assembled
    /// flags vector (e.g. [`Toolchain::compile_flags`] plus the build
    /// plan's per-library include/define/tweaks-dir flags).
    pub fn compile_command_with_flags(&self, lang: Lang, input: &str, output: &str, flags: &[String]) -> Vec<String> {
        let input = [input.to_string()];
        let subs = Substitutions::new(flags).input(&input).output(output);
        let template = match lang {
            Lang::C => &self.c_compile_file,
            Lang::Cxx => &self.cxx_compile_file,
        };
        let mut argv = self.compiler_launcher.clone();
        argv.push(self.compiler_for(lang).to_string());
        argv.extend(lower(template, &subs));
        argv
    }

    pub fn create_archive_command(&self, inputs: &[String], output: &str) -> Vec<String> {
        let subs = Substitutions::new(&[]).input(inputs).output(output);
        lower(&self.create_archive, &subs)
    }

    pub fn link_executable_command(&self, lang: Lang, inputs: &[String], output: &str) -> Vec<String> {
        let flags = self.link_flags();
        let subs = Substitutions::new(&flags).input(inputs).output(output);
        let mut argv = vec![self.compiler_for(lang).to_string()];
        argv.extend(lower(&self.link_executable, &subs));
        argv
    }

    /// Extra compile flags that make the compiler emit dependency
    /// information per `deps_mode`, so a header-only change can be
    /// detected without reading every header's contents (SPEC_FULL §4.G).
    pub fn deps_flags(&self, output: &str) -> Vec<String> {
        match self.deps_mode {
            DepsMode::Gnu => vec!["-MD".into(), "-MF".into(), self.dep_file_path(output).expect("gnu deps_mode always has a dep file")],
            DepsMode::Msvc => vec!["/showIncludes".into()],
            DepsMode::None => Vec::new(),
        }
    }

    /// Where the GNU-style `.d` Makefile fragment lands, or `None` for
    /// modes that report dependencies some other way (MSVC emits them to
    /// stdout instead of a side file).
    pub fn dep_file_path(&self, output: &str) -> Option<String> {
        match self.deps_mode {
            DepsMode::Gnu => Some(format!("{output}.d")),
            DepsMode::Msvc | DepsMode::None => None,
        }
    }

    pub fn include_flags(&self, path: &str, external: bool) -> Vec<String> {
        let template = if external { &self.external_include_template } else { &self.include_template };
        let subs = Substitutions::new(&[]).path(path);
        lower(template, &subs)
    }

    pub fn define_flags(&self, def: &str) -> Vec<String> {
        let subs = Substitutions::new(&[]).def(def);
        lower(&self.define_template, &subs)
    }

    pub fn object_file_name(&self, stem: &str) -> String {
        format!("{}{stem}{}", self.obj_prefix, self.obj_suffix)
    }

    pub fn archive_file_name(&self, stem: &str) -> String {
        format!("{}{stem}{}", self.archive_prefix, self.archive_suffix)
    }

    pub fn exe_file_name(&self, stem: &str) -> String {
        format!("{}{stem}{}", self.exe_prefix, self.exe_suffix)
    }
}

fn default_compile_template(msvc: bool) -> Vec<String> {
    if msvc {
        vec!["[flags]".into(), "/c".into(), "[in]".into(), "/Fo[out]".into()]
    } else {
        vec!["[flags]".into(), "-c".into(), "[in]".into(), "-o[out]".into()]
    }
}

fn default_c_compiler(id: Option<CompilerId>) -> String {
    match id {
        Some(CompilerId::Gnu) => "gcc".to_string(),
        Some(CompilerId::Clang) => "clang".to_string(),
        Some(CompilerId::Msvc) => "cl.exe".to_string(),
        None => "cc".to_string(),
    }
}

fn default_cxx_compiler(id: Option<CompilerId>) -> String {
    match id {
        Some(CompilerId::Gnu) => "g++".to_string(),
        Some(CompilerId::Clang) => "clang++".to_string(),
        Some(CompilerId::Msvc) => "cl.exe".to_string(),
        None => "c++".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gnu_toolchain_lowers_compile_and_link_commands() {
        let doc = json!({
            "compiler_id": "gnu",
            "optimize": true,
            "debug": "split",
            "cxx_version": "c++20",
        });
        let tc = Toolchain::from_json(&doc).unwrap();
        assert_eq!(tc.c_compiler, "gcc");
        assert_eq!(tc.cxx_compiler, "g++");

        let argv = tc.compile_command(Lang::Cxx, "src/a.cpp", "build/a.o");
        assert_eq!(argv[0], "g++");
        assert!(argv.contains(&"-O2".to_string()));
        assert!(argv.contains(&"-g".to_string()));
        assert!(argv.contains(&"-gsplit-dwarf".to_string()));
        assert!(argv.contains(&"-std=c++20".to_string()));
        assert!(argv.contains(&"-fPIC".to_string()));
        assert_eq!(argv[argv.len() - 3], "-c");
        assert_eq!(argv[argv.len() - 2], "src/a.cpp");
        assert_eq!(argv[argv.len() - 1], "-obuild/a.o");

        let link = tc.link_executable_command(Lang::Cxx, &["a.o".into(), "b.o".into()], "app");
        assert_eq!(link[0], "g++");
        assert!(link.contains(&"a.o".to_string()));
        assert!(link.contains(&"b.o".to_string()));
        assert!(!link.contains(&"a.o b.o".to_string()));
        assert!(link.contains(&"-oapp".to_string()));

        let archive = tc.create_archive_command(&["a.o".into(), "b.o".into()], "libfmt.a");
        assert!(archive.contains(&"a.o".to_string()));
        assert!(archive.contains(&"b.o".to_string()));
        assert!(!archive.contains(&"a.o b.o".to_string()));
    }

    #[test]
    fn gnu_deps_mode_emits_md_mf_flags_and_dep_file_path() {
        let doc = json!({"compiler_id": "gnu"});
        let tc = Toolchain::from_json(&doc).unwrap();
        assert_eq!(tc.deps_mode, DepsMode::Gnu);
        let flags = tc.deps_flags("build/a.o");
        assert_eq!(flags, vec!["-MD".to_string(), "-MF".to_string(), "build/a.o.d".to_string()]);
        assert_eq!(tc.dep_file_path("build/a.o"), Some("build/a.o.d".to_string()));
    }

    #[test]
    fn msvc_deps_mode_emits_show_includes_with_no_dep_file() {
        let doc = json!({"compiler_id": "msvc"});
        let tc = Toolchain::from_json(&doc).unwrap();
        assert_eq!(tc.deps_mode, DepsMode::Msvc);
        assert_eq!(tc.deps_flags("a.obj"), vec!["/showIncludes".to_string()]);
        assert_eq!(tc.dep_file_path("a.obj"), None);
    }

    #[test]
    fn msvc_debug_bool_true_means_embedded_not_split() {
        let doc = json!({"compiler_id": "msvc", "debug": true});
        let tc = Toolchain::from_json(&doc).unwrap();
        let argv = tc.compile_command(Lang::C, "a.c", "a.obj");
        assert!(argv.contains(&"/Z7".to_string()));
        assert!(!argv.iter().any(|a| a == "/Zi"));
    }

    #[test]
    fn unknown_top_level_field_suggests_correction() {
        let doc = json!({"compilre_id": "gnu"});
        let err = Toolchain::from_json(&doc).unwrap_err();
        match err {
            Error::UnknownField { field, suggestion, .. } => {
                assert_eq!(field, "compilre_id");
                assert_eq!(suggestion, Some("compiler_id"));
            }
            other => panic!("expected UnknownField, got {other:?}"),
        }
    }

    #[test]
    fn unknown_advanced_field_is_rejected_with_nested_context() {
        let doc = json!({"advanced": {"depsmode": "gnu"}});
        let err = Toolchain::from_json(&doc).unwrap_err();
        assert!(matches!(err, Error::UnknownField { context: "toolchain.advanced", .. }));
    }

    #[test]
    fn archive_and_object_naming_use_platform_defaults() {
        let tc = Toolchain::from_json(&json!({"compiler_id": "gnu"})).unwrap();
        assert_eq!(tc.archive_file_name("core"), "libcore.a");
        assert_eq!(tc.object_file_name("a"), "a.o");

        let tc = Toolchain::from_json(&json!({"compiler_id": "msvc"})).unwrap();
        assert_eq!(tc.archive_file_name("core"), "libcore.lib");
        assert_eq!(tc.object_file_name("a"), "a.obj");
    }

    #[test]
    fn flags_field_accepts_shell_like_string() {
        let doc = json!({"compiler_id": "gnu", "cxx_flags": "-Wshadow -Wfoo"});
        let tc = Toolchain::from_json(&doc).unwrap();
        assert!(tc.cxx_flags.contains(&"-Wshadow".to_string()));
        assert!(tc.cxx_flags.contains(&"-Wfoo".to_string()));
    }
}
