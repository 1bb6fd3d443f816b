//! Tables command handler

use anyhow::Result;
use colored::*;

use super::TablesCommands;
use crate::config::Config;
use crate::store::{ConnectOptions, connect};

/// Handle `kvseed tables`
pub async fn handle_tables_command(args: TablesCommands) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database_url = Some(database);
    }

    let store = connect(&ConnectOptions::new(config.database_url())).await?;
    let tables = store.list_tables().await?;

    if tables.is_empty() {
        println!("No tables in {}", config.database_url().dimmed());
        return Ok(());
    }

    let width = tables.iter().map(|t| t.name.len()).max().unwrap_or(0);
    println!("{:<width$}  {}", "TABLE".bold(), "ITEMS".bold(), width = width);
    for table in &tables {
        println!("{:<width$}  {}", table.name.cyan(), table.items, width = width);
    }

    Ok(())
}
