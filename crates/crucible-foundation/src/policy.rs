//! Shared `--if-exists`/`--if-missing` policy enums, threaded through every
//! CLI subcommand that touches existing on-disk or in-repository state
//! (SPEC_FULL §9.1), rather than each subcommand inventing its own variant.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IfExists {
    #[default]
    Fail,
    Ignore,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IfMissing {
    #[default]
    Fail,
    Ignore,
    Create,
}

impl std::str::FromStr for IfExists {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "ignore" => Ok(Self::Ignore),
            "replace" => Ok(Self::Replace),
            other => Err(format!("invalid --if-exists value `{other}`")),
        }
    }
}

impl std::str::FromStr for IfMissing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "ignore" => Ok(Self::Ignore),
            "create" => Ok(Self::Create),
            other => Err(format!("invalid --if-missing value `{other}`")),
        }
    }
}
