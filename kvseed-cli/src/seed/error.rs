use super::dependencies::DependencyError;
use super::results::ReferenceError;
use super::split::SplitError;

/// Fatal error of a seed run
#[derive(Debug)]
pub enum SeedError {
    /// Lua sandbox could not be created or configured
    Sandbox(anyhow::Error),
    /// A `_dependencies` or host binding failed to load
    Dependency(DependencyError),
    /// `_schema` of a group could not be loaded
    Schema { group: String, source: anyhow::Error },
    /// A reference in an entry could not be resolved
    Reference {
        group: String,
        entry: String,
        source: ReferenceError,
    },
    /// A resolved entry is missing a key attribute
    Split {
        group: String,
        entry: String,
        source: SplitError,
    },
    /// Drop, create or insert failed in storage
    Storage {
        table: String,
        operation: StorageOperation,
        source: anyhow::Error,
    },
}

/// Storage call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOperation {
    DropTable,
    CreateTable,
    Insert,
}

impl std::fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageOperation::DropTable => write!(f, "drop table"),
            StorageOperation::CreateTable => write!(f, "create table"),
            StorageOperation::Insert => write!(f, "insert"),
        }
    }
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Sandbox(e) => write!(f, "failed to prepare sandbox: {:#}", e),
            SeedError::Dependency(e) => write!(f, "{}", e),
            SeedError::Schema { group, source } => {
                write!(f, "group '{}': failed to load schema: {:#}", group, source)
            }
            SeedError::Reference { group, entry, source } => {
                write!(f, "entry '{}.{}': {}", group, entry, source)
            }
            SeedError::Split { group, entry, source } => {
                write!(f, "entry '{}.{}': {}", group, entry, source)
            }
            SeedError::Storage {
                table,
                operation,
                source,
            } => write!(f, "table '{}': {} failed: {:#}", table, operation, source),
        }
    }
}

impl std::error::Error for SeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedError::Sandbox(e) => Some(&**e),
            SeedError::Dependency(e) => Some(e),
            SeedError::Schema { source, .. } => Some(&**source),
            SeedError::Reference { source, .. } => Some(source),
            SeedError::Split { source, .. } => Some(source),
            SeedError::Storage { source, .. } => Some(&**source),
        }
    }
}

impl From<DependencyError> for SeedError {
    fn from(e: DependencyError) -> Self {
        SeedError::Dependency(e)
    }
}
