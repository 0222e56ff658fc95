//! Layered configuration for the `ta` binary.
//!
//! Values resolve in increasing priority: built-in defaults, `config.toml`
//! in the platform config directory, an explicit `--config` file, then
//! `TA_`-prefixed environment variables.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Settings for the `ta` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the SQLite database lives.
    pub database_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        // Fall back to the working directory when the platform reports no
        // data directory.
        let data_dir = data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("ta.db"),
        }
    }
}

impl Config {
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Resolves configuration, layering an explicit file over the defaults
    /// when one is given.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(config_dir) = config_dir() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("TA_")).extract()
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ta"))
}

fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("ta"))
}
