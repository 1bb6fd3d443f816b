//! Lua sandbox for seed expressions
//!
//! Expression values (`=...`) run in a restricted Lua 5.4 state. Only the
//! `table`, `string`, `math` and `utf8` libraries are loaded, and the base
//! functions that reach the file system or compile arbitrary chunks
//! (`dofile`, `loadfile`, `load`, `require`) are removed.
//!
//! Names visible to an expression:
//!
//! - the safe base library
//! - every sandbox binding (`_dependencies` aliases and configured bindings)
//! - `this` / `_this`, the entry record the expression belongs to
//!
//! # Example
//!
//! ```json
//! {
//!     "_dependencies": { "lib": "lib" },
//!     "Users": {
//!         "_schema": "users",
//!         "u1": {
//!             "id": "=lib.guid()",
//!             "name": "Ann",
//!             "email": "=lib.lower(this.name) .. '@example.com'"
//!         }
//!     }
//! }
//! ```

mod evaluate;
mod runtime;
mod stdlib;

pub use evaluate::{EvalError, Evaluator, rewrite_self_references};
pub use runtime::{Sandbox, THIS_BINDING};
pub use stdlib::{LIB_MODULE, create_lib};
