//! Committed results and reference resolution
//!
//! Every record is committed here after its group's inserts succeed, and
//! references (`->root.field...`) only ever see committed records. The root
//! of a reference is matched against group names first, then entry keys:
//!
//! - `->Users.u1.name` walks into group `Users`, entry `u1`, field `name`
//! - `->u1.name` finds entry `u1` in whichever group committed it

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::types::ReferencePath;

/// Error resolving a reference. Always fatal for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// Root names no committed group or entry
    MissingRoot { root: String },
    /// Entry key committed in several groups, used without a group
    AmbiguousRoot { root: String, groups: Vec<String> },
    /// A segment after the root does not exist
    MissingField { reference: String, field: String },
}

impl std::fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceError::MissingRoot { root } => {
                write!(f, "cannot read '{}': no committed group or entry with that name", root)
            }
            ReferenceError::AmbiguousRoot { root, groups } => write!(
                f,
                "entry '{}' exists in groups {}; qualify the reference with a group name",
                root,
                groups.join(", ")
            ),
            ReferenceError::MissingField { reference, field } => {
                write!(f, "cannot read '{}' in reference '{}'", field, reference)
            }
        }
    }
}

impl std::error::Error for ReferenceError {}

/// Append-only store of committed records for one run
#[derive(Debug, Default)]
pub struct ResultStore {
    /// Group name -> object of entry key -> record, in commit order
    groups: Map<String, Value>,
    /// Entry key -> groups that committed it
    entry_groups: HashMap<String, Vec<String>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a record under `(group, entry)`. Committed records are never
    /// replaced; returns false when the pair is already present.
    pub fn commit(&mut self, group: &str, entry: &str, record: Map<String, Value>) -> bool {
        let entries = self
            .groups
            .entry(group.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        let Value::Object(entries) = entries else {
            return false;
        };
        if entries.contains_key(entry) {
            return false;
        }
        entries.insert(entry.to_string(), Value::Object(record));

        self.entry_groups
            .entry(entry.to_string())
            .or_default()
            .push(group.to_string());
        true
    }

    /// Number of committed records
    pub fn len(&self) -> usize {
        self.entry_groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_groups.is_empty()
    }

    /// Resolve a reference against committed records
    pub fn resolve(&self, path: &ReferencePath) -> Result<Value, ReferenceError> {
        let mut current = self.lookup_root(path.root())?;

        for field in path.fields() {
            let next = match current {
                Value::Object(obj) => obj.get(field.as_str()),
                Value::Array(items) => field.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| ReferenceError::MissingField {
                reference: path.to_string(),
                field: field.clone(),
            })?;
        }

        Ok(current.clone())
    }

    fn lookup_root(&self, root: &str) -> Result<&Value, ReferenceError> {
        if let Some(group) = self.groups.get(root) {
            return Ok(group);
        }

        match self.entry_groups.get(root).map(Vec::as_slice) {
            Some([group]) => self
                .groups
                .get(group)
                .and_then(|entries| entries.get(root))
                .ok_or_else(|| ReferenceError::MissingRoot {
                    root: root.to_string(),
                }),
            Some(groups) if groups.len() > 1 => Err(ReferenceError::AmbiguousRoot {
                root: root.to_string(),
                groups: groups.to_vec(),
            }),
            _ => Err(ReferenceError::MissingRoot {
                root: root.to_string(),
            }),
        }
    }
}
