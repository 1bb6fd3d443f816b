//! Core types for seeding

pub mod document;
pub mod schema;
pub mod value;

pub use document::{DocumentError, Entry, Group, SeedDocument, DEPENDENCIES_KEY, SCHEMA_KEY};
pub use schema::{AttributeDefinition, KeyElement, KeyType, TableSchema};
pub use value::{ReferencePath, SeedRecord, SeedValue, EXPRESSION_MARKER, REFERENCE_MARKER};
