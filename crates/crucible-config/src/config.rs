use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::Result;

/// The default repo URL the original distribution pointed at. The CLI help
/// text it shipped with mentions two different hosts across its history;
/// this is the one treated as canonical here.
pub const DEFAULT_REPO_URL: &str = "repo-3.bpt.pizza";

static CONFIG: OnceCell<RwLock<Arc<Config>>> = OnceCell::new();

/// Process-wide configuration for crucible (§1.1, §6.3).
///
/// Layered: built-in defaults < `/etc/crucible/config.toml` (optional) <
/// `dirs::config_dir()/crucible/config.toml` (optional) < `CRUCIBLE_*`
/// environment variables < CLI flags (applied by the caller after loading,
/// via [`Config::make_current`]).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub toolchain: Option<String>,
    pub output_path: Option<String>,
    pub crs_cache_dir: Option<String>,
    pub jobs: usize,
    pub no_default_repo: bool,
    pub default_repo_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            toolchain: None,
            output_path: None,
            crs_cache_dir: None,
            jobs: 0,
            no_default_repo: false,
            default_repo_url: DEFAULT_REPO_URL.to_string(),
        }
    }
}

impl Config {
    /// Get the current loaded config, loading it if needed.
    pub fn current() -> Result<Arc<Self>> {
        get_config()
    }

    /// Load the config from disk, even if it's already been loaded before.
    pub fn load() -> Result<Self> {
        load_config()
    }

    /// Make this config the current global one.
    pub fn make_current(self) -> Result<Arc<Self>> {
        let config = CONFIG.get_or_try_init(|| -> Result<RwLock<Arc<Config>>> {
            Ok(RwLock::new(Arc::new(self.clone())))
        })?;

        let mut lock = config
            .write()
            .map_err(|err| crate::Error::LockPoisonedWrite(err.to_string()))?;
        *Arc::make_mut(&mut lock) = self;
        Ok(Arc::clone(&lock))
    }
}

/// Get the current crucible config, fetching it from disk if needed.
pub fn get_config() -> Result<Arc<Config>> {
    let config = CONFIG.get_or_try_init(|| -> Result<RwLock<Arc<Config>>> {
        Ok(RwLock::new(Arc::new(load_config()?)))
    })?;
    let lock = config
        .read()
        .map_err(|err| crate::Error::LockPoisonedRead(err.to_string()))?;
    Ok(Arc::clone(&*lock))
}

/// Load the crucible configuration from disk, even if it has already been
/// loaded. Includes the default, user, and system configurations (if they
/// exist), then applies `CRUCIBLE_*` environment variable overrides.
pub fn load_config() -> Result<Config> {
    use config::{Config as RawConfig, File};

    const USER_CONFIG_BASE: &str = "crucible/config";
    let user_config = dirs::config_dir()
        .map(|dir| dir.join(USER_CONFIG_BASE))
        .ok_or(crate::Error::NoUserConfigDir)?;

    let mut config_builder = RawConfig::builder()
        .add_source(File::with_name("/etc/crucible/config").required(false))
        .add_source(File::with_name(&user_config.display().to_string()).required(false));

    for (var, value) in std::env::vars() {
        let Some(key) = var.strip_prefix("CRUCIBLE_") else {
            continue;
        };
        config_builder = config_builder.set_override(key.to_lowercase(), value)?;
    }

    let config = config_builder.build()?;
    Ok(Config::deserialize(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_the_resolved_repo_url() {
        let config = Config::default();
        assert_eq!(config.default_repo_url, DEFAULT_REPO_URL);
        assert_eq!(config.jobs, 0);
        assert!(!config.no_default_repo);
    }
}
