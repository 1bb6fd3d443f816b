//! Seed command handler

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;

use super::SeedCommands;
use crate::config::Config;
use crate::seed::{FileSchemaSource, SeedDocument, SeedSummary, seed};
use crate::store::{ConnectOptions, connect};

/// Handle `kvseed seed`
pub async fn handle_seed_command(args: SeedCommands) -> Result<()> {
    if args.no_color {
        colored::control::set_override(false);
    }

    if !args.document.exists() {
        anyhow::bail!("Seed document does not exist: {}", args.document.display());
    }

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);

    let document = SeedDocument::from_file(&args.document)?;
    let schemas = FileSchemaSource::new(config.schema_dir());

    println!(
        "Seeding {} entries in {} groups from {}",
        document.entry_count().to_string().bold(),
        document.groups.len().to_string().bold(),
        args.document.display().to_string().cyan()
    );
    println!("Database: {}", config.database_url().dimmed());
    if config.drop_tables {
        println!("{}", "Tables will be dropped before they are created".yellow());
    }
    println!();

    let store = connect(&ConnectOptions::new(config.database_url())).await?;

    let start = Instant::now();
    let summary = seed(&store, &schemas, &document, config.seed_options())
        .await
        .context("Seeding failed")?;

    print_summary(&summary);
    println!();
    println!(
        "{} {} records in {:.2}s",
        "Seeded".bright_green().bold(),
        summary.records(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

fn print_summary(summary: &SeedSummary) {
    if summary.dependencies > 0 {
        println!("Dependencies bound: {}", summary.dependencies);
    }

    let width = summary
        .groups
        .iter()
        .map(|g| g.group.len())
        .max()
        .unwrap_or(0);

    for group in &summary.groups {
        println!(
            "  {} {:<width$} -> {} ({} records)",
            "✓".green(),
            group.group,
            group.table.cyan(),
            group.records,
            width = width
        );
    }
}
