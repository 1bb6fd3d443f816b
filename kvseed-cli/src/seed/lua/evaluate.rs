//! Expression evaluation
//!
//! An expression is the text after the `=` marker, evaluated as Lua against
//! the sandbox bindings and the parent record. `this.field` and `this[...]`
//! address the parent record:
//!
//! ```json
//! { "first": "Ann", "last": "Lee", "full": "=this.first .. ' ' .. this.last" }
//! ```
//!
//! Evaluation errors are values, not panics. [`Evaluator::evaluate_or_fallback`]
//! applies the seeding policy: a failed expression keeps its original text.

use mlua::Table;
use once_cell::sync::Lazy;
use regex::Regex;

use super::runtime::{Sandbox, THIS_BINDING};
use crate::seed::types::EXPRESSION_MARKER;

static THIS_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bthis([.\[])").expect("valid self-reference pattern"));

/// Error from evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Sandbox could not prepare the environment
    Environment(String),
    /// Lua failed to compile or run the expression
    Runtime(String),
    /// Result has no JSON form (function, userdata, ...)
    Conversion(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Environment(msg) => write!(f, "failed to prepare expression environment: {}", msg),
            EvalError::Runtime(msg) => write!(f, "expression failed: {}", msg),
            EvalError::Conversion(msg) => write!(f, "expression result not representable: {}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

/// Rewrite self-references to address the injected parent binding
pub fn rewrite_self_references(source: &str) -> String {
    THIS_REF
        .replace_all(source, format!("{}$1", THIS_BINDING).as_str())
        .into_owned()
}

/// Evaluates expressions inside a sandbox
pub struct Evaluator<'a> {
    sandbox: &'a Sandbox,
}

impl<'a> Evaluator<'a> {
    pub fn new(sandbox: &'a Sandbox) -> Self {
        Evaluator { sandbox }
    }

    /// Evaluate expression text (marker already stripped) with `parent` as
    /// `this`. The result is returned as produced; strings that look like
    /// references or expressions are not evaluated again.
    pub fn evaluate(&self, source: &str, parent: Option<&Table>) -> Result<serde_json::Value, EvalError> {
        let env = self
            .sandbox
            .environment(parent.cloned())
            .map_err(|e| EvalError::Environment(e.to_string()))?;

        let code = rewrite_self_references(source);
        let value = self
            .sandbox
            .eval(&code, "expression", env)
            .map_err(|e| EvalError::Runtime(e.to_string()))?;

        self.sandbox
            .lua_to_json(value)
            .map_err(|e| EvalError::Conversion(e.to_string()))
    }

    /// Evaluate, keeping the original `=...` text when evaluation fails
    pub fn evaluate_or_fallback(&self, source: &str, parent: Option<&Table>) -> serde_json::Value {
        match self.evaluate(source, parent) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("Keeping expression '{}{}' unevaluated: {}", EXPRESSION_MARKER, source, e);
                serde_json::Value::String(format!("{}{}", EXPRESSION_MARKER, source))
            }
        }
    }
}
