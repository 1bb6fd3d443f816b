//! SQLite-backed table store
//!
//! Every seeded table becomes a SQLite table with two columns:
//!
//! - `item_key`: the key values in key schema order, as a JSON array (primary key)
//! - `item`: the full item as a JSON object

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{TableStore, item, item_key};
use crate::seed::types::TableSchema;

/// Connection settings for [`connect`]
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub database_url: String,
    pub max_connections: u32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 5,
        }
    }
}

impl ConnectOptions {
    pub fn new(database_url: impl Into<String>) -> Self {
        ConnectOptions {
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    /// In-memory databases live per connection
    pub fn is_memory(&self) -> bool {
        self.database_url.contains(":memory:") || self.database_url.contains("mode=memory")
    }
}

/// A table and its item count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub items: i64,
}

/// Open a SQLite database, creating the file if needed
pub async fn connect(options: &ConnectOptions) -> Result<SqliteTableStore> {
    let connect_options = SqliteConnectOptions::from_str(&options.database_url)
        .with_context(|| format!("Invalid database URL: {}", options.database_url))?
        .create_if_missing(true);

    let mut pool_options = SqlitePoolOptions::new().max_connections(options.max_connections.max(1));
    if options.is_memory() {
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(connect_options)
        .await
        .with_context(|| format!("Failed to connect to database: {}", options.database_url))?;

    log::debug!("Connected to {}", options.database_url);
    Ok(SqliteTableStore::new(pool))
}

/// [`TableStore`] over a SQLite pool
#[derive(Debug, Clone)]
pub struct SqliteTableStore {
    pool: SqlitePool,
}

impl SqliteTableStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteTableStore { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Item stored under a key, if any
    pub async fn get(&self, table: &str, key: &Map<String, Value>) -> Result<Option<Map<String, Value>>> {
        let row = sqlx::query(&format!("SELECT item FROM {} WHERE item_key = ?", quote_ident(table)))
            .bind(item_key(key))
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read from table {}", table))?;

        match row {
            Some(row) => Ok(Some(decode_item(&row.try_get::<String, _>("item")?)?)),
            None => Ok(None),
        }
    }

    /// Every item of a table in insertion order
    pub async fn scan(&self, table: &str) -> Result<Vec<Map<String, Value>>> {
        let rows = sqlx::query(&format!("SELECT item FROM {} ORDER BY rowid", quote_ident(table)))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to scan table {}", table))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(decode_item(&row.try_get::<String, _>("item")?)?);
        }
        Ok(items)
    }

    /// All tables with their item counts, by name
    pub async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tables")?;

        let mut tables = Vec::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let items: i64 = sqlx::query(&format!("SELECT COUNT(*) AS items FROM {}", quote_ident(&name)))
                .fetch_one(&self.pool)
                .await
                .with_context(|| format!("Failed to count items in table {}", name))?
                .try_get("items")?;
            tables.push(TableInfo { name, items });
        }
        Ok(tables)
    }
}

#[async_trait]
impl TableStore for SqliteTableStore {
    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (item_key TEXT PRIMARY KEY, item TEXT NOT NULL)",
            quote_ident(&schema.table_name)
        ))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to create table {}", schema.table_name))?;
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to drop table {}", table))?;
        Ok(())
    }

    async fn insert(&self, table: &str, key: &Map<String, Value>, data: &Map<String, Value>) -> Result<()> {
        let item_json =
            serde_json::to_string(&item(key, data)).context("Failed to serialize item")?;

        sqlx::query(&format!("INSERT INTO {} (item_key, item) VALUES (?, ?)", quote_ident(table)))
            .bind(item_key(key))
            .bind(item_json)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert {} into table {}", item_key(key), table))?;
        Ok(())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn decode_item(text: &str) -> Result<Map<String, Value>> {
    serde_json::from_str(text).context("Failed to deserialize stored item")
}
