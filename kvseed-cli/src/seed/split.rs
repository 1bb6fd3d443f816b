//! Key/data splitting of resolved records

use serde_json::{Map, Value};

use super::types::TableSchema;

/// A resolved record partitioned by the table's key schema
#[derive(Debug, Clone, PartialEq)]
pub struct SplitRecord {
    /// Key attributes, in key schema order
    pub key: Map<String, Value>,
    /// Every other attribute, in record order
    pub data: Map<String, Value>,
}

impl SplitRecord {
    /// Key and data merged back into one item, key attributes first
    pub fn item(&self) -> Map<String, Value> {
        crate::store::item(&self.key, &self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    MissingKeyAttribute { table: String, attribute: String },
}

impl std::fmt::Display for SplitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::MissingKeyAttribute { table, attribute } => {
                write!(f, "record for table '{}' has no key attribute '{}'", table, attribute)
            }
        }
    }
}

impl std::error::Error for SplitError {}

/// Split a record into key and data parts. Every key attribute must be present.
pub fn split_record(mut record: Map<String, Value>, schema: &TableSchema) -> Result<SplitRecord, SplitError> {
    let mut key = Map::new();

    for attribute in schema.key_attributes() {
        let value = record
            .shift_remove(attribute)
            .ok_or_else(|| SplitError::MissingKeyAttribute {
                table: schema.table_name.clone(),
                attribute: attribute.to_string(),
            })?;
        key.insert(attribute.to_string(), value);
    }

    Ok(SplitRecord { key, data: record })
}
