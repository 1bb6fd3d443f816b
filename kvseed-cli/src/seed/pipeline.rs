//! Group pipeline
//!
//! Groups run one after another in document order. For each group:
//!
//! 1. drop the table (only with `drop_tables`)
//! 2. create the table
//! 3. unwind and split every entry
//! 4. insert all entries concurrently, waiting for every insert
//! 5. commit the resolved entries so later groups can reference them
//!
//! Any failure stops the run. Groups that completed stay in storage.

use futures::future::try_join_all;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;

use super::context::{RunContext, SeedOptions};
use super::error::{SeedError, StorageOperation};
use super::schemas::SchemaSource;
use super::split::{SplitRecord, split_record};
use super::types::{Group, SeedDocument, TableSchema};
use super::unwind::Unwinder;
use crate::store::TableStore;

/// Outcome of a seed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Groups in the order they were seeded
    pub groups: Vec<GroupSummary>,
    /// Dependencies newly bound for the run
    pub dependencies: usize,
}

impl SeedSummary {
    /// Total number of inserted records
    pub fn records(&self) -> usize {
        self.groups.iter().map(|g| g.records).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub group: String,
    pub table: String,
    pub records: usize,
}

/// An entry ready to insert
struct PreparedEntry {
    key: String,
    resolved: Map<String, Value>,
    split: SplitRecord,
}

/// Seed every group of a document into `store`
pub async fn seed<S>(
    store: &S,
    schemas: &dyn SchemaSource,
    document: &SeedDocument,
    options: SeedOptions,
) -> Result<SeedSummary, SeedError>
where
    S: TableStore + ?Sized,
{
    let mut ctx = RunContext::new(options)?;
    let mut summary = SeedSummary {
        dependencies: ctx.load_dependencies(&document.dependencies)?,
        ..Default::default()
    };

    for group in &document.groups {
        summary.groups.push(seed_group(store, schemas, &mut ctx, group).await?);
    }

    Ok(summary)
}

async fn seed_group<S>(
    store: &S,
    schemas: &dyn SchemaSource,
    ctx: &mut RunContext,
    group: &Group,
) -> Result<GroupSummary, SeedError>
where
    S: TableStore + ?Sized,
{
    let schema = schemas
        .load(&group.schema_ref)
        .map_err(|source| SeedError::Schema {
            group: group.name.clone(),
            source,
        })?;
    let table = schema.table_name.as_str();

    if ctx.options.drop_tables {
        log::info!("Drop table: {}", table);
        store
            .drop_table(table)
            .await
            .map_err(storage_error(table, StorageOperation::DropTable))?;
    }

    log::info!("Create table: {}", table);
    store
        .create_table(&schema)
        .await
        .map_err(storage_error(table, StorageOperation::CreateTable))?;

    let prepared = prepare_group(ctx, group, &schema)?;

    log::info!("Insert {} items: {}", prepared.len(), table);
    insert_all(store, table, &prepared, ctx.options.max_concurrent_inserts).await?;

    let records = prepared.len();
    for entry in prepared {
        if !ctx.results.commit(&group.name, &entry.key, entry.resolved) {
            log::warn!("Entry '{}.{}' already committed, keeping the first", group.name, entry.key);
        }
    }

    Ok(GroupSummary {
        group: group.name.clone(),
        table: schema.table_name.clone(),
        records,
    })
}

/// Unwind and split every entry of a group
fn prepare_group(ctx: &RunContext, group: &Group, schema: &TableSchema) -> Result<Vec<PreparedEntry>, SeedError> {
    let unwinder = Unwinder::new(&ctx.sandbox, &ctx.results);

    group
        .entries
        .iter()
        .map(|entry| {
            let resolved = unwinder
                .unwind_record(&entry.record)
                .map_err(|source| SeedError::Reference {
                    group: group.name.clone(),
                    entry: entry.key.clone(),
                    source,
                })?;

            let split = split_record(resolved.clone(), schema).map_err(|source| SeedError::Split {
                group: group.name.clone(),
                entry: entry.key.clone(),
                source,
            })?;

            Ok(PreparedEntry {
                key: entry.key.clone(),
                resolved,
                split,
            })
        })
        .collect::<Result<Vec<_>, SeedError>>()
}

/// Issue all inserts at once, optionally capped, and wait for every one
async fn insert_all<S>(
    store: &S,
    table: &str,
    prepared: &[PreparedEntry],
    max_concurrent: Option<usize>,
) -> Result<(), SeedError>
where
    S: TableStore + ?Sized,
{
    let limiter = max_concurrent.map(|n| Semaphore::new(n.max(1)));

    let inserts = prepared.iter().map(|entry| {
        let limiter = limiter.as_ref();
        async move {
            let _permit = match limiter {
                Some(semaphore) => Some(
                    semaphore
                        .acquire()
                        .await
                        .map_err(|e| anyhow::anyhow!(e))
                        .map_err(storage_error(table, StorageOperation::Insert))?,
                ),
                None => None,
            };

            log::debug!("Insert '{}' into {}", entry.key, table);
            store
                .insert(table, &entry.split.key, &entry.split.data)
                .await
                .map_err(storage_error(table, StorageOperation::Insert))
        }
    });

    try_join_all(inserts).await?;
    Ok(())
}

fn storage_error(table: &str, operation: StorageOperation) -> impl Fn(anyhow::Error) -> SeedError + '_ {
    move |source| SeedError::Storage {
        table: table.to_string(),
        operation,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::schemas::MemorySchemaSource;
    use crate::store::{MemoryTableStore, StoreCall};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Barrier;

    fn schemas() -> MemorySchemaSource {
        MemorySchemaSource::new()
            .with("users", TableSchema::new("users", &["id"]))
            .with("posts", TableSchema::new("posts", &["id"]))
            .with("items", TableSchema::new("items", &["id"]))
    }

    fn document(value: Value) -> SeedDocument {
        SeedDocument::from_json(&value).unwrap()
    }

    fn users_and_posts() -> SeedDocument {
        document(json!({
            "Users": {
                "_schema": "users",
                "u1": { "id": "u1", "name": "Ann" }
            },
            "Posts": {
                "_schema": "posts",
                "p1": { "id": "p1", "author": "->Users.u1.name", "title": "Hello" }
            }
        }))
    }

    fn calls_of(store: &MemoryTableStore, f: impl Fn(&StoreCall) -> bool) -> usize {
        store.calls().iter().filter(|c| f(c)).count()
    }

    #[tokio::test]
    async fn test_reference_to_earlier_group() {
        let store = MemoryTableStore::new();

        let summary = seed(&store, &schemas(), &users_and_posts(), SeedOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.records(), 2);
        assert_eq!(summary.groups[0].table, "users");
        assert_eq!(summary.groups[1].group, "Posts");

        let posts = store.items("posts").unwrap();
        assert_eq!(
            Value::Object(posts[0].clone()),
            json!({ "id": "p1", "author": "Ann", "title": "Hello" })
        );
    }

    #[tokio::test]
    async fn test_drop_tables_option() {
        let store = MemoryTableStore::new();
        let options = SeedOptions {
            drop_tables: true,
            ..Default::default()
        };
        seed(&store, &schemas(), &users_and_posts(), options).await.unwrap();

        let calls = store.calls();
        assert_eq!(calls[0], StoreCall::DropTable("users".into()));
        assert_eq!(calls[1], StoreCall::CreateTable("users".into()));
        assert_eq!(calls[3], StoreCall::DropTable("posts".into()));
        assert_eq!(calls[4], StoreCall::CreateTable("posts".into()));

        let store = MemoryTableStore::new();
        seed(&store, &schemas(), &users_and_posts(), SeedOptions::default())
            .await
            .unwrap();
        assert_eq!(calls_of(&store, |c| matches!(c, StoreCall::DropTable(_))), 0);
        assert_eq!(calls_of(&store, |c| matches!(c, StoreCall::CreateTable(_))), 2);
    }

    #[tokio::test]
    async fn test_forward_reference_fails() {
        let store = MemoryTableStore::new();
        let doc = document(json!({
            "Posts": {
                "_schema": "posts",
                "p1": { "id": "p1", "author": "->Users.u1.name" }
            },
            "Users": {
                "_schema": "users",
                "u1": { "id": "u1", "name": "Ann" }
            }
        }));

        let err = seed(&store, &schemas(), &doc, SeedOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SeedError::Reference { ref group, ref entry, .. } if group == "Posts" && entry == "p1"));
        assert_eq!(calls_of(&store, |c| matches!(c, StoreCall::Insert { .. })), 0);
        assert!(store.items("users").is_none());
    }

    #[tokio::test]
    async fn test_reference_by_entry_key_and_whole_record() {
        let store = MemoryTableStore::new();
        let doc = document(json!({
            "Users": {
                "_schema": "users",
                "u1": { "id": "u1", "name": "Ann" }
            },
            "Posts": {
                "_schema": "posts",
                "p1": { "id": "p1", "owner": "->u1" }
            }
        }));

        seed(&store, &schemas(), &doc, SeedOptions::default()).await.unwrap();
        assert_eq!(
            store.items("posts").unwrap()[0]["owner"],
            json!({ "id": "u1", "name": "Ann" })
        );
    }

    #[tokio::test]
    async fn test_expressions_and_fallback_are_inserted() {
        let store = MemoryTableStore::new();
        let mut bindings = Map::new();
        bindings.insert("site".into(), json!({ "domain": "example.com" }));

        let doc = document(json!({
            "_dependencies": { "lib": "lib" },
            "Users": {
                "_schema": "users",
                "u1": {
                    "id": "=lib.lower('U1')",
                    "name": "Ann",
                    "email": "=lib.lower(this.name) .. '@' .. site.domain",
                    "when": "=moment().format()"
                }
            }
        }));

        let summary = seed(
            &store,
            &schemas(),
            &doc,
            SeedOptions {
                bindings,
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.dependencies, 1);
        let users = store.items("users").unwrap();
        assert_eq!(users[0]["id"], json!("u1"));
        assert_eq!(users[0]["email"], json!("ann@example.com"));
        assert_eq!(users[0]["when"], json!("=moment().format()"));
    }

    #[tokio::test]
    async fn test_dependency_failure_stops_before_any_group() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryTableStore::new();
        let doc = document(json!({
            "_dependencies": { "moment": "moment" },
            "Users": { "_schema": "users", "u1": { "id": "u1" } }
        }));

        let err = seed(
            &store,
            &schemas(),
            &doc,
            SeedOptions {
                dependency_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SeedError::Dependency(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_schema_fails() {
        let store = MemoryTableStore::new();
        let doc = document(json!({ "Tags": { "_schema": "tags", "t1": { "id": 1 } } }));

        let err = seed(&store, &schemas(), &doc, SeedOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Schema { ref group, .. } if group == "Tags"));
    }

    #[tokio::test]
    async fn test_missing_key_attribute_fails() {
        let store = MemoryTableStore::new();
        let doc = document(json!({ "Users": { "_schema": "users", "u1": { "name": "Ann" } } }));

        let err = seed(&store, &schemas(), &doc, SeedOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Split { .. }));
        assert_eq!(calls_of(&store, |c| matches!(c, StoreCall::Insert { .. })), 0);
    }

    #[tokio::test]
    async fn test_insert_failure_stops_the_run() {
        let store = MemoryTableStore::new();
        let doc = document(json!({
            "Users": {
                "_schema": "users",
                "u1": { "id": "same" },
                "u2": { "id": "same" }
            },
            "Posts": { "_schema": "posts", "p1": { "id": "p1" } }
        }));

        let err = seed(&store, &schemas(), &doc, SeedOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SeedError::Storage { operation: StorageOperation::Insert, ref table, .. } if table == "users"
        ));
        assert!(store.items("posts").is_none());
    }

    /// Inserts into `items` wait until three of them are in flight
    struct BarrierStore {
        inner: MemoryTableStore,
        barrier: Barrier,
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TableStore for BarrierStore {
        async fn create_table(&self, schema: &TableSchema) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(format!("create {}", schema.table_name));
            self.inner.create_table(schema).await
        }

        async fn drop_table(&self, table: &str) -> anyhow::Result<()> {
            self.inner.drop_table(table).await
        }

        async fn insert(&self, table: &str, key: &Map<String, Value>, data: &Map<String, Value>) -> anyhow::Result<()> {
            if table == "items" {
                self.barrier.wait().await;
            }
            self.events.lock().unwrap().push(format!("insert {}", table));
            self.inner.insert(table, key, data).await
        }
    }

    #[tokio::test]
    async fn test_group_inserts_run_concurrently() {
        let store = BarrierStore {
            inner: MemoryTableStore::new(),
            barrier: Barrier::new(3),
            events: Mutex::new(Vec::new()),
        };
        let doc = document(json!({
            "Items": {
                "_schema": "items",
                "a": { "id": "a" },
                "b": { "id": "b" },
                "c": { "id": "c" }
            },
            "Users": { "_schema": "users", "u1": { "id": "u1", "first": "->Items.a.id" } }
        }));

        // Sequential inserts would never get past the barrier
        tokio::time::timeout(
            Duration::from_secs(5),
            seed(&store, &schemas(), &doc, SeedOptions::default()),
        )
        .await
        .expect("inserts did not run concurrently")
        .unwrap();

        let events = store.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "create items",
                "insert items",
                "insert items",
                "insert items",
                "create users",
                "insert users"
            ]
        );
        assert_eq!(store.inner.items("users").unwrap()[0]["first"], json!("a"));
    }

    /// Tracks the highest number of inserts in flight
    #[derive(Default)]
    struct CountingStore {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl TableStore for CountingStore {
        async fn create_table(&self, _schema: &TableSchema) -> anyhow::Result<()> {
            Ok(())
        }

        async fn drop_table(&self, _table: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn insert(&self, _table: &str, _key: &Map<String, Value>, _data: &Map<String, Value>) -> anyhow::Result<()> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn three_items() -> SeedDocument {
        document(json!({
            "Items": {
                "_schema": "items",
                "a": { "id": "a" },
                "b": { "id": "b" },
                "c": { "id": "c" }
            }
        }))
    }

    #[tokio::test]
    async fn test_unbounded_inserts_overlap() {
        let store = CountingStore::default();
        seed(&store, &schemas(), &three_items(), SeedOptions::default())
            .await
            .unwrap();
        assert_eq!(store.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_max_concurrent_inserts_caps_fan_out() {
        let store = CountingStore::default();
        let options = SeedOptions {
            max_concurrent_inserts: Some(1),
            ..Default::default()
        };
        let summary = seed(&store, &schemas(), &three_items(), options).await.unwrap();

        assert_eq!(summary.records(), 3);
        assert_eq!(store.peak.load(Ordering::SeqCst), 1);
    }
}
