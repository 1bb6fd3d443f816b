//! Table storage
//!
//! The seed pipeline only talks to storage through [`TableStore`]. Two
//! backends ship with the crate:
//!
//! - [`SqliteTableStore`]: one SQLite table per seeded table, items stored as JSON
//! - [`MemoryTableStore`]: in-process tables that also record every call made

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::seed::types::TableSchema;

mod memory;
mod sqlite;

pub use memory::{MemoryTableStore, StoreCall};
pub use sqlite::{ConnectOptions, SqliteTableStore, TableInfo, connect};

/// Storage primitives used by the seed pipeline
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Create a table if it does not exist
    async fn create_table(&self, schema: &TableSchema) -> Result<()>;

    /// Drop a table if it exists
    async fn drop_table(&self, table: &str) -> Result<()>;

    /// Insert one item. Fails if an item with the same key exists.
    async fn insert(&self, table: &str, key: &Map<String, Value>, data: &Map<String, Value>) -> Result<()>;
}

/// Storage key of an item: its key values in key schema order, as a JSON array
pub fn item_key(key: &Map<String, Value>) -> String {
    Value::Array(key.values().cloned().collect()).to_string()
}

/// Key and data merged into the stored item
pub fn item(key: &Map<String, Value>, data: &Map<String, Value>) -> Map<String, Value> {
    let mut item = key.clone();
    for (name, value) in data {
        item.insert(name.clone(), value.clone());
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_key_follows_key_order() {
        let mut key = Map::new();
        key.insert("author".into(), json!("Ann"));
        key.insert("created".into(), json!(3));
        assert_eq!(item_key(&key), r#"["Ann",3]"#);
    }

    #[test]
    fn test_item_merges_key_and_data() {
        let key = json!({ "id": 1 }).as_object().unwrap().clone();
        let data = json!({ "name": "Ann" }).as_object().unwrap().clone();
        assert_eq!(Value::Object(item(&key, &data)), json!({ "id": 1, "name": "Ann" }));
    }
}
