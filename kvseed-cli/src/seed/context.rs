//! Run-scoped state of a seed

use std::path::PathBuf;

use serde_json::{Map, Value};

use super::dependencies::{DependencyError, DependencyLoader};
use super::error::SeedError;
use super::lua::Sandbox;
use super::results::ResultStore;

/// Options for one seed run
#[derive(Debug, Clone)]
pub struct SeedOptions {
    /// Drop each group's table before creating it
    pub drop_tables: bool,
    /// Base directory for `_dependencies` module files
    pub dependency_dir: PathBuf,
    /// Cap on concurrent inserts within a group, unbounded when `None`
    pub max_concurrent_inserts: Option<usize>,
    /// Values bound into the sandbox before `_dependencies`
    pub bindings: Map<String, Value>,
}

impl Default for SeedOptions {
    fn default() -> Self {
        SeedOptions {
            drop_tables: false,
            dependency_dir: PathBuf::from("."),
            max_concurrent_inserts: None,
            bindings: Map::new(),
        }
    }
}

/// Sandbox, committed results and options of a run
pub struct RunContext {
    pub sandbox: Sandbox,
    pub results: ResultStore,
    pub options: SeedOptions,
}

impl RunContext {
    /// Fresh context with host bindings bound
    pub fn new(options: SeedOptions) -> Result<Self, SeedError> {
        let mut sandbox = Sandbox::new().map_err(SeedError::Sandbox)?;

        for (alias, value) in &options.bindings {
            sandbox
                .bind_json(alias, value)
                .map_err(|e| DependencyError::Binding {
                    alias: alias.clone(),
                    message: e.to_string(),
                })?;
        }

        Ok(RunContext {
            sandbox,
            results: ResultStore::new(),
            options,
        })
    }

    /// Bind a document's dependencies. Returns the number of new bindings.
    pub fn load_dependencies(&mut self, dependencies: &[(String, String)]) -> Result<usize, SeedError> {
        let loader = DependencyLoader::new(&self.options.dependency_dir);
        Ok(loader.load_all(&mut self.sandbox, dependencies)?)
    }
}
