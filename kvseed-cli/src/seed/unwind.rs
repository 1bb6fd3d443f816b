//! Recursive resolution of seed records
//!
//! Walks a record's value tree and replaces every expression with its result
//! and every reference with the committed value it points at. Expressions
//! always see the entry record as `this`, including inside nested objects and
//! lists.

use mlua::Table;
use serde_json::{Map, Value};

use super::lua::{Evaluator, Sandbox};
use super::results::{ReferenceError, ResultStore};
use super::types::{SeedRecord, SeedValue};

/// Resolves seed records against a sandbox and the committed results
pub struct Unwinder<'a> {
    evaluator: Evaluator<'a>,
    sandbox: &'a Sandbox,
    results: &'a ResultStore,
}

impl<'a> Unwinder<'a> {
    pub fn new(sandbox: &'a Sandbox, results: &'a ResultStore) -> Self {
        Unwinder {
            evaluator: Evaluator::new(sandbox),
            sandbox,
            results,
        }
    }

    /// Resolve an entry record. Reference failures are fatal; expression
    /// failures keep the expression text.
    pub fn unwind_record(&self, record: &SeedRecord) -> Result<Map<String, Value>, ReferenceError> {
        let parent = self.parent_table(record);
        self.unwind_fields(record, parent.as_ref())
    }

    /// Resolve a single value with an explicit parent
    pub fn unwind_value(&self, value: &SeedValue, parent: Option<&Table>) -> Result<Value, ReferenceError> {
        match value {
            SeedValue::Literal(v) => Ok(v.clone()),
            SeedValue::Expression(source) => Ok(self.evaluator.evaluate_or_fallback(source, parent)),
            SeedValue::Reference(path) => self.results.resolve(path),
            SeedValue::Object(record) => Ok(Value::Object(self.unwind_fields(record, parent)?)),
            SeedValue::Sequence(items) => items
                .iter()
                .map(|item| self.unwind_value(item, parent))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }

    fn unwind_fields(&self, record: &SeedRecord, parent: Option<&Table>) -> Result<Map<String, Value>, ReferenceError> {
        let mut resolved = Map::new();
        for (name, value) in record.iter() {
            resolved.insert(name.to_string(), self.unwind_value(value, parent)?);
        }
        Ok(resolved)
    }

    /// The raw record as a Lua table, only built when an expression needs it
    fn parent_table(&self, record: &SeedRecord) -> Option<Table> {
        if !record.has_expressions() {
            return None;
        }
        match self.sandbox.record_to_lua(&record.to_raw_json()) {
            Ok(table) => Some(table),
            Err(e) => {
                log::debug!("Failed to expose record to expressions: {}", e);
                None
            }
        }
    }
}
