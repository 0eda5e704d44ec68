use strum::{Display, EnumString};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CompilerId {
    Msvc,
    Gnu,
    Clang,
}

impl CompilerId {
    pub fn parse(s: &str) -> Result<Self> {
        s.parse().map_err(|_| Error::InvalidCompilerId(s.to_owned()))
    }

    pub fn is_gnu_like(self) -> bool {
        matches!(self, CompilerId::Gnu | CompilerId::Clang)
    }

    pub fn is_msvc(self) -> bool {
        matches!(self, CompilerId::Msvc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DebugMode {
    None,
    Embedded,
    Split,
}

/// `debug` may be a bare bool or one of `{none, embedded, split}` (SPEC_FULL
/// §4.E); `true` is equivalent to `embedded`, `false` to `none`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSetting {
    Bool(bool),
    Mode(DebugMode),
}

impl DebugSetting {
    pub fn wants_debug_info(self) -> bool {
        match self {
            DebugSetting::Bool(b) => b,
            DebugSetting::Mode(DebugMode::None) => false,
            DebugSetting::Mode(_) => true,
        }
    }

    pub fn is_split(self) -> bool {
        matches!(self, DebugSetting::Mode(DebugMode::Split))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum DepsMode {
    Gnu,
    Msvc,
    None,
}

impl DepsMode {
    pub fn parse(s: &str) -> Result<Self> {
        s.parse().map_err(|_| Error::InvalidDepsMode(s.to_owned()))
    }

    pub fn default_for(compiler_id: Option<CompilerId>) -> Self {
        match compiler_id {
            Some(id) if id.is_gnu_like() => DepsMode::Gnu,
            Some(id) if id.is_msvc() => DepsMode::Msvc,
            _ => DepsMode::None,
        }
    }
}
