//! Configuration file and environment
//!
//! Settings come from, lowest precedence first:
//!
//! 1. `<config_dir>/kvseed/config.toml` (or the file given with `--config`)
//! 2. `KVSEED_DATABASE_URL`, also read from `.env`
//! 3. command line flags
//!
//! ```toml
//! database_url = "sqlite://seed.db"
//! drop_tables = true
//! schema_dir = "schemas"
//! dependency_dir = "lua"
//! max_concurrent_inserts = 8
//!
//! [bindings]
//! domain = "example.com"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::seed::SeedOptions;

/// Environment variable overriding `database_url`
pub const DATABASE_URL_ENV: &str = "KVSEED_DATABASE_URL";

/// Database used when nothing is configured
pub const DEFAULT_DATABASE_URL: &str = "sqlite://kvseed.db";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: Option<String>,
    pub drop_tables: bool,
    pub schema_dir: Option<PathBuf>,
    pub dependency_dir: Option<PathBuf>,
    pub max_concurrent_inserts: Option<usize>,
    /// Values bound into the expression sandbox
    pub bindings: Map<String, Value>,
}

/// `<config_dir>/kvseed/config.toml`, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("kvseed").join("config.toml"))
}

impl Config {
    /// Load configuration. An explicit path must exist; the default path is
    /// optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Config::default(),
            },
        };

        dotenvy::dotenv().ok();
        config.apply_database_override(std::env::var(DATABASE_URL_ENV).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Replace `database_url` with a non-empty override
    pub fn apply_database_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            log::debug!("Using database URL from {}", DATABASE_URL_ENV);
            self.database_url = Some(url);
        }
    }

    pub fn database_url(&self) -> &str {
        self.database_url.as_deref().unwrap_or(DEFAULT_DATABASE_URL)
    }

    pub fn schema_dir(&self) -> PathBuf {
        self.schema_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Seed options described by this configuration
    pub fn seed_options(&self) -> SeedOptions {
        SeedOptions {
            drop_tables: self.drop_tables,
            dependency_dir: self
                .dependency_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            max_concurrent_inserts: self.max_concurrent_inserts,
            bindings: self.bindings.clone(),
        }
    }
}
