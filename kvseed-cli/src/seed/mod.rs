//! Seed engine
//!
//! Expands a seed document into concrete records and inserts them group by
//! group. A document maps group names to groups; each group names its table
//! schema with `_schema` and lists entries by key:
//!
//! ```json
//! {
//!     "_dependencies": { "lib": "lib" },
//!     "Users": {
//!         "_schema": "users",
//!         "u1": { "id": "=lib.guid()", "name": "Ann" }
//!     },
//!     "Posts": {
//!         "_schema": "posts",
//!         "p1": { "id": "p1", "author": "->Users.u1.id" }
//!     }
//! }
//! ```
//!
//! String values starting with `=` are Lua expressions, values starting with
//! `->` reference fields of entries committed by earlier groups.

pub mod context;
pub mod dependencies;
pub mod error;
pub mod lua;
pub mod pipeline;
pub mod results;
pub mod schemas;
pub mod split;
pub mod types;
pub mod unwind;

pub use context::{RunContext, SeedOptions};
pub use dependencies::{DependencyError, DependencyLoader};
pub use error::{SeedError, StorageOperation};
pub use pipeline::{GroupSummary, SeedSummary, seed};
pub use results::{ReferenceError, ResultStore};
pub use schemas::{FileSchemaSource, MemorySchemaSource, SchemaSource};
pub use split::{SplitError, SplitRecord, split_record};
pub use types::{SeedDocument, TableSchema};
pub use unwind::Unwinder;
