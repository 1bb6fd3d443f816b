//! kvseed - seed key/value tables from declarative documents
//!
//! ```no_run
//! use kvseed::seed::{FileSchemaSource, SeedDocument, SeedOptions, seed};
//! use kvseed::store::{ConnectOptions, connect};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = connect(&ConnectOptions::new("sqlite://seed.db")).await?;
//! let document = SeedDocument::from_file("fixtures.json".as_ref())?;
//! let summary = seed(&store, &FileSchemaSource::new("schemas"), &document, SeedOptions::default()).await?;
//! println!("{} records", summary.records());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod seed;
pub mod store;

pub use seed::{SeedError, SeedOptions, SeedSummary, seed};
pub use store::{ConnectOptions, SqliteTableStore, TableStore, connect};
