//! Table schema definitions
//!
//! Schemas use the DynamoDB `CreateTable` layout so existing table definition
//! files can be reused:
//!
//! ```json
//! {
//!     "TableName": "users",
//!     "KeySchema": [
//!         { "AttributeName": "id", "KeyType": "HASH" },
//!         { "AttributeName": "created", "KeyType": "RANGE" }
//!     ],
//!     "AttributeDefinitions": [
//!         { "AttributeName": "id", "AttributeType": "S" },
//!         { "AttributeName": "created", "AttributeType": "N" }
//!     ]
//! }
//! ```
//!
//! Only `TableName` and `KeySchema` drive seeding. Other fields are kept so
//! storage adapters can use them.

use serde::{Deserialize, Serialize};

/// A table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableSchema {
    pub table_name: String,
    pub key_schema: Vec<KeyElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_definitions: Vec<AttributeDefinition>,
}

/// One key attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyElement {
    pub attribute_name: String,
    #[serde(default)]
    pub key_type: KeyType,
}

/// Role of a key attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    /// Partition key
    #[default]
    Hash,
    /// Sort key
    Range,
}

/// Declared type of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: String,
}

impl TableSchema {
    /// Create a schema from a table name and its key attributes, all `HASH`
    /// except a second attribute which becomes the `RANGE` key
    pub fn new(table_name: impl Into<String>, key_attributes: &[&str]) -> Self {
        TableSchema {
            table_name: table_name.into(),
            key_schema: key_attributes
                .iter()
                .enumerate()
                .map(|(i, name)| KeyElement {
                    attribute_name: name.to_string(),
                    key_type: if i == 0 { KeyType::Hash } else { KeyType::Range },
                })
                .collect(),
            attribute_definitions: Vec::new(),
        }
    }

    /// Parse a schema from JSON text
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Names of the key attributes, in key schema order
    pub fn key_attributes(&self) -> Vec<&str> {
        self.key_schema
            .iter()
            .map(|k| k.attribute_name.as_str())
            .collect()
    }
}
