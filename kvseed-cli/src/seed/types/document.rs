//! Seed document model
//!
//! A seed document is a JSON object whose keys are group names, processed in
//! document order. Two keys are structural:
//!
//! - `_dependencies` at the top level maps sandbox aliases to module identifiers
//! - `_schema` inside each group names the table schema for that group
//!
//! ```json
//! {
//!     "_dependencies": { "lib": "lib" },
//!     "Users": {
//!         "_schema": "schemas/users.json",
//!         "u1": { "id": "=lib.guid()", "name": "Ann" }
//!     },
//!     "Posts": {
//!         "_schema": "schemas/posts.json",
//!         "p1": { "id": 1, "author": "->Users.u1.name" }
//!     }
//! }
//! ```

use std::path::Path;

use super::value::SeedRecord;

/// Top-level key declaring sandbox dependencies
pub const DEPENDENCIES_KEY: &str = "_dependencies";

/// Per-group key naming the schema
pub const SCHEMA_KEY: &str = "_schema";

/// Error when a document does not have the expected shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// Document root is not an object
    NotAnObject,
    /// `_dependencies` is not an object of strings
    InvalidDependencies { alias: Option<String> },
    /// Group value is not an object
    InvalidGroup { group: String },
    /// Group has no `_schema` string
    MissingSchema { group: String },
    /// Entry value is not an object
    InvalidEntry { group: String, entry: String },
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::NotAnObject => write!(f, "seed document must be a JSON object"),
            DocumentError::InvalidDependencies { alias: None } => {
                write!(f, "'{}' must be an object of alias -> module", DEPENDENCIES_KEY)
            }
            DocumentError::InvalidDependencies { alias: Some(alias) } => {
                write!(f, "dependency '{}' must name a module as a string", alias)
            }
            DocumentError::InvalidGroup { group } => {
                write!(f, "group '{}' must be an object", group)
            }
            DocumentError::MissingSchema { group } => {
                write!(f, "group '{}' has no '{}' string", group, SCHEMA_KEY)
            }
            DocumentError::InvalidEntry { group, entry } => {
                write!(f, "entry '{}.{}' must be an object", group, entry)
            }
        }
    }
}

impl std::error::Error for DocumentError {}

/// A parsed seed document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedDocument {
    /// Sandbox alias -> module identifier, in declaration order
    pub dependencies: Vec<(String, String)>,
    /// Groups in document order
    pub groups: Vec<Group>,
}

/// A named set of entries sharing one table
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    /// Value of `_schema`, resolved by a schema source
    pub schema_ref: String,
    /// Entries in document order
    pub entries: Vec<Entry>,
}

/// One record of a group, addressable by its key
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: String,
    pub record: SeedRecord,
}

impl SeedDocument {
    /// Parse a document from JSON text
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Self::from_json(&json)?)
    }

    /// Read and parse a document file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed document: {}", path.display()))?;
        Self::parse(&text)
            .with_context(|| format!("Failed to parse seed document: {}", path.display()))
    }

    /// Build a document from a JSON value, stripping the structural keys
    pub fn from_json(json: &serde_json::Value) -> Result<Self, DocumentError> {
        let root = json.as_object().ok_or(DocumentError::NotAnObject)?;
        let mut document = SeedDocument::default();

        for (name, value) in root {
            if name == DEPENDENCIES_KEY {
                document.dependencies = parse_dependencies(value)?;
                continue;
            }
            document.groups.push(parse_group(name, value)?);
        }

        Ok(document)
    }

    /// Total number of entries across all groups
    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }
}

fn parse_dependencies(value: &serde_json::Value) -> Result<Vec<(String, String)>, DocumentError> {
    let obj = value
        .as_object()
        .ok_or(DocumentError::InvalidDependencies { alias: None })?;

    obj.iter()
        .map(|(alias, module)| {
            module
                .as_str()
                .map(|m| (alias.clone(), m.to_string()))
                .ok_or_else(|| DocumentError::InvalidDependencies {
                    alias: Some(alias.clone()),
                })
        })
        .collect()
}

fn parse_group(name: &str, value: &serde_json::Value) -> Result<Group, DocumentError> {
    let obj = value.as_object().ok_or_else(|| DocumentError::InvalidGroup {
        group: name.to_string(),
    })?;

    let schema_ref = obj
        .get(SCHEMA_KEY)
        .and_then(|s| s.as_str())
        .ok_or_else(|| DocumentError::MissingSchema {
            group: name.to_string(),
        })?
        .to_string();

    let mut entries = Vec::with_capacity(obj.len().saturating_sub(1));
    for (key, record) in obj {
        if key == SCHEMA_KEY {
            continue;
        }
        let record = record.as_object().ok_or_else(|| DocumentError::InvalidEntry {
            group: name.to_string(),
            entry: key.clone(),
        })?;
        entries.push(Entry {
            key: key.clone(),
            record: SeedRecord::from_map(record),
        });
    }

    Ok(Group {
        name: name.to_string(),
        schema_ref,
        entries,
    })
}
