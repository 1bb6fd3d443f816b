use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{TableStore, item, item_key};
use crate::seed::types::TableSchema;

/// A call made against a [`MemoryTableStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    DropTable(String),
    CreateTable(String),
    Insert { table: String, key: Map<String, Value>, data: Map<String, Value> },
}

#[derive(Debug, Default)]
struct State {
    /// Table name -> item key -> item, in insertion order
    tables: HashMap<String, Vec<(String, Map<String, Value>)>>,
    calls: Vec<StoreCall>,
}

/// In-process table store that records every call
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    state: Mutex<State>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().map(|s| s.calls.clone()).unwrap_or_default()
    }

    /// Items of a table in insertion order, `None` if the table does not exist
    pub fn items(&self, table: &str) -> Option<Vec<Map<String, Value>>> {
        let state = self.lock().ok()?;
        state
            .tables
            .get(table)
            .map(|items| items.iter().map(|(_, item)| item.clone()).collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("Memory table store lock poisoned"))
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn create_table(&self, schema: &TableSchema) -> Result<()> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::CreateTable(schema.table_name.clone()));
        state.tables.entry(schema.table_name.clone()).or_default();
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::DropTable(table.to_string()));
        state.tables.remove(table);
        Ok(())
    }

    async fn insert(&self, table: &str, key: &Map<String, Value>, data: &Map<String, Value>) -> Result<()> {
        let mut state = self.lock()?;
        state.calls.push(StoreCall::Insert {
            table: table.to_string(),
            key: key.clone(),
            data: data.clone(),
        });

        let id = item_key(key);
        let Some(items) = state.tables.get_mut(table) else {
            bail!("Table does not exist: {}", table);
        };
        if items.iter().any(|(existing, _)| *existing == id) {
            bail!("Duplicate key {} in table {}", id, table);
        }
        items.push((id, item(key, data)));
        Ok(())
    }
}
