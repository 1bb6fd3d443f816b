//! `kvseed seed`

mod handler;

pub use handler::handle_seed_command;

use clap::Args;
use std::path::PathBuf;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct SeedCommands {
    /// Seed document (JSON)
    pub document: PathBuf,

    /// Database URL, e.g. sqlite://seed.db
    #[arg(short, long)]
    pub database: Option<String>,

    /// Drop every table before creating it
    #[arg(long)]
    pub drop_tables: bool,

    /// Directory `_schema` references are resolved against
    #[arg(long)]
    pub schema_dir: Option<PathBuf>,

    /// Directory `_dependencies` modules are resolved against
    #[arg(long)]
    pub dependency_dir: Option<PathBuf>,

    /// Configuration file (defaults to <config dir>/kvseed/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum number of concurrent inserts per group
    #[arg(long)]
    pub max_concurrent_inserts: Option<usize>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl SeedCommands {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(database) = &self.database {
            config.database_url = Some(database.clone());
        }
        if self.drop_tables {
            config.drop_tables = true;
        }
        if let Some(dir) = &self.schema_dir {
            config.schema_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.dependency_dir {
            config.dependency_dir = Some(dir.clone());
        }
        if let Some(max) = self.max_concurrent_inserts {
            config.max_concurrent_inserts = Some(max);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SeedCommands {
        SeedCommands {
            document: PathBuf::from("seed.json"),
            database: None,
            drop_tables: false,
            schema_dir: None,
            dependency_dir: None,
            config: None,
            max_concurrent_inserts: None,
            no_color: false,
        }
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::from_toml_str(
            r#"
            database_url = "sqlite://file.db"
            schema_dir = "schemas"
            max_concurrent_inserts = 8
            "#,
        )
        .unwrap();

        SeedCommands {
            database: Some("sqlite::memory:".into()),
            drop_tables: true,
            max_concurrent_inserts: Some(2),
            ..args()
        }
        .apply(&mut config);

        assert_eq!(config.database_url(), "sqlite::memory:");
        assert!(config.drop_tables);
        assert_eq!(config.max_concurrent_inserts, Some(2));
        assert_eq!(config.schema_dir(), PathBuf::from("schemas"));
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let mut config = Config::from_toml_str("drop_tables = true").unwrap();
        args().apply(&mut config);
        assert!(config.drop_tables);
        assert!(config.database_url.is_none());
    }
}
