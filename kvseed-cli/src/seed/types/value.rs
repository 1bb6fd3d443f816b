//! Seed value representation
//!
//! Every value in a seed document is classified once, when the document is
//! parsed. Strings beginning with `=` are expressions, strings beginning with
//! `->` are references to previously committed records, everything else is
//! carried through as-is.

use serde_json::Map;

/// Prefix marking an embedded expression
pub const EXPRESSION_MARKER: &str = "=";

/// Prefix marking a cross-record reference
pub const REFERENCE_MARKER: &str = "->";

/// A value in a seed document, tagged at parse time
#[derive(Debug, Clone, PartialEq)]
pub enum SeedValue {
    /// String, number, bool or null, copied unchanged
    Literal(serde_json::Value),
    /// Expression source with the leading `=` removed
    Expression(String),
    /// Path into an already committed record
    Reference(ReferencePath),
    /// Nested object
    Object(SeedRecord),
    /// Ordered list
    Sequence(Vec<SeedValue>),
}

impl SeedValue {
    /// Classify a JSON value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::String(s) => {
                if let Some(source) = s.strip_prefix(EXPRESSION_MARKER) {
                    SeedValue::Expression(source.to_string())
                } else if let Some(path) = s.strip_prefix(REFERENCE_MARKER) {
                    SeedValue::Reference(ReferencePath::parse(path))
                } else {
                    SeedValue::Literal(json.clone())
                }
            }
            serde_json::Value::Array(items) => {
                SeedValue::Sequence(items.iter().map(SeedValue::from_json).collect())
            }
            serde_json::Value::Object(obj) => SeedValue::Object(SeedRecord::from_map(obj)),
            other => SeedValue::Literal(other.clone()),
        }
    }

    /// Convert back to JSON with markers in their textual form
    pub fn to_raw_json(&self) -> serde_json::Value {
        match self {
            SeedValue::Literal(v) => v.clone(),
            SeedValue::Expression(source) => {
                serde_json::Value::String(format!("{}{}", EXPRESSION_MARKER, source))
            }
            SeedValue::Reference(path) => serde_json::Value::String(path.to_string()),
            SeedValue::Object(record) => serde_json::Value::Object(record.to_raw_json()),
            SeedValue::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(SeedValue::to_raw_json).collect())
            }
        }
    }

    /// Whether this value or any descendant is an expression
    pub fn has_expressions(&self) -> bool {
        match self {
            SeedValue::Expression(_) => true,
            SeedValue::Object(record) => record.has_expressions(),
            SeedValue::Sequence(items) => items.iter().any(SeedValue::has_expressions),
            SeedValue::Literal(_) | SeedValue::Reference(_) => false,
        }
    }
}

/// An ordered set of named seed values (an entry, or a nested object)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedRecord {
    fields: Vec<(String, SeedValue)>,
}

impl SeedRecord {
    /// Classify every field of a JSON object, keeping field order
    pub fn from_map(map: &Map<String, serde_json::Value>) -> Self {
        SeedRecord {
            fields: map
                .iter()
                .map(|(name, value)| (name.clone(), SeedValue::from_json(value)))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SeedValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_expressions(&self) -> bool {
        self.fields.iter().any(|(_, v)| v.has_expressions())
    }

    /// The record as JSON, markers kept as text
    pub fn to_raw_json(&self) -> Map<String, serde_json::Value> {
        self.fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_raw_json()))
            .collect()
    }
}

/// A dotted path `root(.segment)*` naming a value inside a committed record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferencePath {
    segments: Vec<String>,
}

impl ReferencePath {
    /// Split a path on `.`. No validation happens here; an unknown or empty
    /// root is reported when the reference is resolved.
    pub fn parse(path: &str) -> Self {
        ReferencePath {
            segments: path.split('.').map(|s| s.to_string()).collect(),
        }
    }

    /// First segment, looked up in the result store
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    /// Segments after the root
    pub fn fields(&self) -> &[String] {
        &self.segments[1..]
    }
}

impl std::fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", REFERENCE_MARKER, self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_markers() {
        assert_eq!(
            SeedValue::from_json(&json!("=1 + 1")),
            SeedValue::Expression("1 + 1".to_string())
        );
        assert_eq!(
            SeedValue::from_json(&json!("->Users.u1.name")),
            SeedValue::Reference(ReferencePath::parse("Users.u1.name"))
        );
        assert_eq!(
            SeedValue::from_json(&json!("plain")),
            SeedValue::Literal(json!("plain"))
        );
        assert_eq!(SeedValue::from_json(&json!(42)), SeedValue::Literal(json!(42)));
        assert_eq!(SeedValue::from_json(&json!(null)), SeedValue::Literal(json!(null)));
    }

    #[test]
    fn test_markers_only_count_as_prefix() {
        assert_eq!(
            SeedValue::from_json(&json!("a = b")),
            SeedValue::Literal(json!("a = b"))
        );
        assert_eq!(
            SeedValue::from_json(&json!("x -> y")),
            SeedValue::Literal(json!("x -> y"))
        );
    }

    #[test]
    fn test_nested_classification() {
        let value = SeedValue::from_json(&json!({
            "tags": ["a", "->Tags.t1.name"],
            "profile": { "age": "=20 + 1" }
        }));

        let SeedValue::Object(record) = value else {
            panic!("expected object");
        };
        assert_eq!(record.len(), 2);
        assert!(record.has_expressions());

        match record.iter().find(|(name, _)| *name == "tags").map(|(_, v)| v) {
            Some(SeedValue::Sequence(items)) => {
                assert!(matches!(items[1], SeedValue::Reference(_)));
            }
            other => panic!("unexpected tags value: {:?}", other),
        }
    }

    #[test]
    fn test_raw_json_restores_markers() {
        let original = json!({
            "name": "Ann",
            "greeting": "='Hello ' .. this.name",
            "owner": "->Users.u1.id",
            "list": [1, "=2"]
        });
        let record = SeedRecord::from_map(original.as_object().unwrap());

        assert_eq!(serde_json::Value::Object(record.to_raw_json()), original);
    }

    #[test]
    fn test_record_keeps_field_order() {
        let original = json!({ "z": 1, "a": 2, "m": 3 });
        let record = SeedRecord::from_map(original.as_object().unwrap());
        let names: Vec<&str> = record.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_reference_path_parts() {
        let path = ReferencePath::parse("Users.u1.address.city");
        assert_eq!(path.root(), "Users");
        assert_eq!(path.fields(), &["u1", "address", "city"]);
        assert_eq!(path.to_string(), "->Users.u1.address.city");

        let root_only = ReferencePath::parse("u1");
        assert_eq!(root_only.root(), "u1");
        assert!(root_only.fields().is_empty());
    }
}
