//! Command line interface

pub mod commands;

use clap::{Parser, Subcommand};

use commands::seed::SeedCommands;
use commands::tables::TablesCommands;

#[derive(Parser)]
#[command(name = "kvseed")]
#[command(version)]
#[command(about = "Seed key/value tables from declarative JSON documents")]
#[command(long_about = r#"
Seed key/value tables from declarative JSON documents.

Documents list records per table. String values starting with `=` are Lua
expressions, values starting with `->` reference records seeded earlier.

Example usage:
  kvseed seed fixtures.json --drop-tables
  kvseed seed fixtures.json --database sqlite://test.db --schema-dir schemas
  kvseed tables --database sqlite://test.db
"#)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Seed tables from a document
    Seed(SeedCommands),

    /// List tables and their item counts
    Tables(TablesCommands),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_seed_command() {
        let cli = Cli::parse_from([
            "kvseed",
            "seed",
            "fixtures.json",
            "--drop-tables",
            "--database",
            "sqlite::memory:",
            "--max-concurrent-inserts",
            "4",
        ]);

        let Commands::Seed(args) = cli.command else {
            panic!("expected seed command");
        };
        assert_eq!(args.document, PathBuf::from("fixtures.json"));
        assert!(args.drop_tables);
        assert_eq!(args.database.as_deref(), Some("sqlite::memory:"));
        assert_eq!(args.max_concurrent_inserts, Some(4));
        assert!(args.schema_dir.is_none());
    }

    #[test]
    fn test_parse_tables_command() {
        let cli = Cli::parse_from(["kvseed", "-v", "tables"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Tables(_)));
    }

    #[test]
    fn test_seed_requires_document() {
        assert!(Cli::try_parse_from(["kvseed", "seed"]).is_err());
    }
}
