//! Parses the raw JSON toolchain document into [`RawToolchain`], rejecting
//! unknown keys with a "did you mean" hint (SPEC_FULL §4.E).

use serde_json::{Map, Value};

use crate::compiler::{CompilerId, DebugSetting, DebugMode};
use crate::error::{Error, Result};
use crate::hint::suggest;

const TOP_LEVEL_FIELDS: &[&str] = &[
    "$schema",
    "compiler_id",
    "c_compiler",
    "cxx_compiler",
    "c_version",
    "cxx_version",
    "c_flags",
    "cxx_flags",
    "warning_flags",
    "link_flags",
    "compiler_launcher",
    "debug",
    "optimize",
    "flags",
    "runtime",
    "advanced",
];

const RUNTIME_FIELDS: &[&str] = &["static", "debug"];

const ADVANCED_FIELDS: &[&str] = &[
    "deps_mode",
    "include_template",
    "external_include_template",
    "define_template",
    "base_warning_flags",
    "base_flags",
    "base_c_flags",
    "base_cxx_flags",
    "c_compile_file",
    "cxx_compile_file",
    "create_archive",
    "link_executable",
    "tty_flags",
    "obj_prefix",
    "obj_suffix",
    "archive_prefix",
    "archive_suffix",
    "exe_prefix",
    "exe_suffix",
    "lang_version_flag_template",
    "c_source_type_flags",
    "cxx_source_type_flags",
    "syntax_only_flags",
    "consider_env",
];

#[derive(Debug, Default)]
pub struct RawAdvanced {
    pub deps_mode: Option<String>,
    pub include_template: Option<Vec<String>>,
    pub external_include_template: Option<Vec<String>>,
    pub define_template: Option<Vec<String>>,
    pub base_warning_flags: Option<Vec<String>>,
    pub base_flags: Option<Vec<String>>,
    pub base_c_flags: Option<Vec<String>>,
    pub base_cxx_flags: Option<Vec<String>>,
    pub c_compile_file: Option<Vec<String>>,
    pub cxx_compile_file: Option<Vec<String>>,
    pub create_archive: Option<Vec<String>>,
    pub link_executable: Option<Vec<String>>,
    pub tty_flags: Option<Vec<String>>,
    pub obj_prefix: Option<String>,
    pub obj_suffix: Option<String>,
    pub archive_prefix: Option<String>,
    pub archive_suffix: Option<String>,
    pub exe_prefix: Option<String>,
    pub exe_suffix: Option<String>,
    pub lang_version_flag_template: Option<String>,
    pub c_source_type_flags: Option<Vec<String>>,
    pub cxx_source_type_flags: Option<Vec<String>>,
    pub syntax_only_flags: Option<Vec<String>>,
    pub consider_env: Option<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct RawToolchain {
    pub compiler_id: Option<CompilerId>,
    pub c_compiler: Option<String>,
    pub cxx_compiler: Option<String>,
    pub c_version: Option<String>,
    pub cxx_version: Option<String>,
    pub compiler_launcher: Option<Vec<String>>,
    pub common_flags: Option<Vec<String>>,
    pub c_flags: Option<Vec<String>>,
    pub cxx_flags: Option<Vec<String>>,
    pub link_flags: Option<Vec<String>>,
    pub warning_flags: Option<Vec<String>>,
    pub debug: Option<DebugSetting>,
    pub optimize: Option<bool>,
    pub runtime_static: Option<bool>,
    pub runtime_debug: Option<bool>,
    pub advanced: RawAdvanced,
}

pub fn parse(value: &Value) -> Result<RawToolchain> {
    let obj = value.as_object().ok_or_else(|| Error::InvalidToolchain {
        context: "<root>",
        message: "root of toolchain data must be a mapping".into(),
    })?;

    let mut raw = RawToolchain::default();
    for key in obj.keys() {
        if !TOP_LEVEL_FIELDS.contains(&key.as_str()) {
            return Err(Error::UnknownField {
                field: key.clone(),
                context: "toolchain",
                suggestion: suggest(key, TOP_LEVEL_FIELDS),
            });
        }
    }

    if let Some(v) = obj.get("compiler_id") {
        raw.compiler_id = Some(CompilerId::parse(require_str(v, "compiler_id")?)?);
    }
    raw.c_compiler = opt_str(obj, "c_compiler")?;
    raw.cxx_compiler = opt_str(obj, "cxx_compiler")?;
    raw.c_version = opt_str(obj, "c_version")?;
    raw.cxx_version = opt_str(obj, "cxx_version")?;
    raw.compiler_launcher = opt_flags(obj, "compiler_launcher")?;
    raw.common_flags = opt_flags(obj, "flags")?;
    raw.c_flags = opt_flags(obj, "c_flags")?;
    raw.cxx_flags = opt_flags(obj, "cxx_flags")?;
    raw.link_flags = opt_flags(obj, "link_flags")?;
    raw.warning_flags = opt_flags(obj, "warning_flags")?;

    if let Some(v) = obj.get("debug") {
        raw.debug = Some(parse_debug(v)?);
    }
    if let Some(v) = obj.get("optimize") {
        raw.optimize = Some(require_bool(v, "optimize")?);
    }

    if let Some(Value::Object(runtime)) = obj.get("runtime") {
        for key in runtime.keys() {
            if !RUNTIME_FIELDS.contains(&key.as_str()) {
                return Err(Error::UnknownField {
                    field: key.clone(),
                    context: "toolchain.runtime",
                    suggestion: suggest(key, RUNTIME_FIELDS),
                });
            }
        }
        if let Some(v) = runtime.get("static") {
            raw.runtime_static = Some(require_bool(v, "runtime.static")?);
        }
        if let Some(v) = runtime.get("debug") {
            raw.runtime_debug = Some(require_bool(v, "runtime.debug")?);
        }
    } else if obj.contains_key("runtime") {
        return Err(Error::InvalidToolchain {
            context: "toolchain.runtime",
            message: "must be a JSON object".into(),
        });
    }

    if let Some(Value::Object(advanced)) = obj.get("advanced") {
        for key in advanced.keys() {
            if !ADVANCED_FIELDS.contains(&key.as_str()) {
                return Err(Error::UnknownField {
                    field: key.clone(),
                    context: "toolchain.advanced",
                    suggestion: suggest(key, ADVANCED_FIELDS),
                });
            }
        }
        raw.advanced = RawAdvanced {
            deps_mode: opt_str(advanced, "deps_mode")?,
            include_template: opt_flags(advanced, "include_template")?,
            external_include_template: opt_flags(advanced, "external_include_template")?,
            define_template: opt_flags(advanced, "define_template")?,
            base_warning_flags: opt_flags(advanced, "base_warning_flags")?,
            base_flags: opt_flags(advanced, "base_flags")?,
            base_c_flags: opt_flags(advanced, "base_c_flags")?,
            base_cxx_flags: opt_flags(advanced, "base_cxx_flags")?,
            c_compile_file: opt_flags(advanced, "c_compile_file")?,
            cxx_compile_file: opt_flags(advanced, "cxx_compile_file")?,
            create_archive: opt_flags(advanced, "create_archive")?,
            link_executable: opt_flags(advanced, "link_executable")?,
            tty_flags: opt_flags(advanced, "tty_flags")?,
            obj_prefix: opt_str(advanced, "obj_prefix")?,
            obj_suffix: opt_str(advanced, "obj_suffix")?,
            archive_prefix: opt_str(advanced, "archive_prefix")?,
            archive_suffix: opt_str(advanced, "archive_suffix")?,
            exe_prefix: opt_str(advanced, "exe_prefix")?,
            exe_suffix: opt_str(advanced, "exe_suffix")?,
            lang_version_flag_template: opt_str(advanced, "lang_version_flag_template")?,
            c_source_type_flags: opt_flags(advanced, "c_source_type_flags")?,
            cxx_source_type_flags: opt_flags(advanced, "cxx_source_type_flags")?,
            syntax_only_flags: opt_flags(advanced, "syntax_only_flags")?,
            consider_env: opt_flags(advanced, "consider_env")?,
        };
    } else if obj.contains_key("advanced") {
        return Err(Error::InvalidToolchain {
            context: "toolchain.advanced",
            message: "must be a JSON object".into(),
        });
    }

    Ok(raw)
}

fn parse_debug(value: &Value) -> Result<DebugSetting> {
    match value {
        Value::Bool(b) => Ok(DebugSetting::Bool(*b)),
        Value::String(s) => s
            .parse::<DebugMode>()
            .map(DebugSetting::Mode)
            .map_err(|_| Error::InvalidDebugMode(s.clone())),
        _ => Err(Error::InvalidToolchain {
            context: "toolchain.debug",
            message: "must be a bool or string".into(),
        }),
    }
}

fn require_str<'a>(value: &'a Value, field: &'static str) -> Result<&'a str> {
    value.as_str().ok_or_else(|| Error::InvalidToolchain {
        context: field,
        message: "must be a string".into(),
    })
}

fn require_bool(value: &Value, field: &'static str) -> Result<bool> {
    value.as_bool().ok_or_else(|| Error::InvalidToolchain {
        context: field,
        message: "must be a boolean".into(),
    })
}

fn opt_str(obj: &Map<String, Value>, field: &'static str) -> Result<Option<String>> {
    match obj.get(field) {
        Some(v) => Ok(Some(require_str(v, field)?.to_owned())),
        None => Ok(None),
    }
}

/// A flags field accepts either a single shell-like string (split on
/// whitespace, honoring quoting) or a JSON array of strings.
fn opt_flags(obj: &Map<String, Value>, field: &'static str) -> Result<Option<Vec<String>>> {
    match obj.get(field) {
        Some(Value::String(s)) => {
            let words = shell_words::split(s).map_err(|_| Error::InvalidToolchain {
                context: field,
                message: format!("`{s}` is not a valid shell-like flag string"),
            })?;
            Ok(Some(words))
        }
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(
                    item.as_str()
                        .ok_or_else(|| Error::InvalidToolchain {
                            context: field,
                            message: "array elements must be strings".into(),
                        })?
                        .to_owned(),
                );
            }
            Ok(Some(out))
        }
        Some(_) => Err(Error::InvalidToolchain {
            context: field,
            message: "must be an array or a shell-like string".into(),
        }),
        None => Ok(None),
    }
}
