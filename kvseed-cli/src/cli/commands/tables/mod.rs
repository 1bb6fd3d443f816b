//! `kvseed tables`

mod handler;

pub use handler::handle_tables_command;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct TablesCommands {
    /// Database URL, e.g. sqlite://seed.db
    #[arg(short, long)]
    pub database: Option<String>,

    /// Configuration file (defaults to <config dir>/kvseed/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}
