//! Schema sources resolving a group's `_schema` reference

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;

use super::types::TableSchema;

/// Resolves `_schema` references into table schemas
pub trait SchemaSource: Send + Sync {
    fn load(&self, schema_ref: &str) -> Result<TableSchema>;
}

/// Loads JSON schema files relative to a base directory
///
/// `users.schema` is looked up as `<base>/users.schema`, then
/// `<base>/users.schema.json`.
#[derive(Debug, Clone)]
pub struct FileSchemaSource {
    base_dir: PathBuf,
}

impl FileSchemaSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        FileSchemaSource {
            base_dir: base_dir.into(),
        }
    }

    fn resolve(&self, schema_ref: &str) -> Option<PathBuf> {
        let exact = self.base_dir.join(schema_ref);
        if exact.is_file() {
            return Some(exact);
        }
        let with_ext = self.base_dir.join(format!("{}.json", schema_ref));
        with_ext.is_file().then_some(with_ext)
    }
}

impl SchemaSource for FileSchemaSource {
    fn load(&self, schema_ref: &str) -> Result<TableSchema> {
        let path = self.resolve(schema_ref).with_context(|| {
            format!(
                "Schema '{}' not found in {}",
                schema_ref,
                self.base_dir.display()
            )
        })?;

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?;

        TableSchema::from_json_str(&text)
            .with_context(|| format!("Invalid schema file: {}", path.display()))
    }
}

/// Serves schemas registered in code
#[derive(Debug, Clone, Default)]
pub struct MemorySchemaSource {
    schemas: HashMap<String, TableSchema>,
}

impl MemorySchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under a reference, builder style
    pub fn with(mut self, schema_ref: impl Into<String>, schema: TableSchema) -> Self {
        self.schemas.insert(schema_ref.into(), schema);
        self
    }

    pub fn insert(&mut self, schema_ref: impl Into<String>, schema: TableSchema) {
        self.schemas.insert(schema_ref.into(), schema);
    }
}

impl SchemaSource for MemorySchemaSource {
    fn load(&self, schema_ref: &str) -> Result<TableSchema> {
        self.schemas
            .get(schema_ref)
            .cloned()
            .with_context(|| format!("Schema '{}' is not registered", schema_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS_SCHEMA: &str = r#"{
        "TableName": "users",
        "KeySchema": [{ "AttributeName": "id", "KeyType": "HASH" }]
    }"#;

    #[test]
    fn test_file_source_exact_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("schemas")).unwrap();
        std::fs::write(dir.path().join("schemas/users.json"), USERS_SCHEMA).unwrap();

        let source = FileSchemaSource::new(dir.path());
        let schema = source.load("schemas/users.json").unwrap();
        assert_eq!(schema.table_name, "users");
    }

    #[test]
    fn test_file_source_appends_json_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("users.schema.json"), USERS_SCHEMA).unwrap();

        let source = FileSchemaSource::new(dir.path());
        let schema = source.load("users.schema").unwrap();
        assert_eq!(schema.key_attributes(), vec!["id"]);
    }

    #[test]
    fn test_file_source_missing_schema() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSchemaSource::new(dir.path());

        let err = source.load("nope").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_file_source_invalid_schema() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{\"KeySchema\": 1}").unwrap();

        let source = FileSchemaSource::new(dir.path());
        let err = source.load("broken").unwrap_err();
        assert!(err.to_string().contains("Invalid schema file"));
    }

    #[test]
    fn test_memory_source() {
        let source = MemorySchemaSource::new().with("users.schema", TableSchema::new("users", &["id"]));

        assert_eq!(source.load("users.schema").unwrap().table_name, "users");
        assert!(source.load("posts.schema").is_err());
    }
}
