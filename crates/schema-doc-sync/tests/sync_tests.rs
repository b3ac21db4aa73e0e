//! End-to-end sync runs against an in-memory extended-property catalog.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use schema_doc_sync::model::{PropertySpec, TypeSpec};
use schema_doc_sync::{
    Connector, DocumentationIndex, SchemaSyncEngine, SlotOutcome, SqlSession, SyncError,
    SyncOptions, TypeRef, TypeRegistry,
};

type Catalog = BTreeMap<(String, String, Option<String>), String>;

#[derive(Default)]
struct CatalogState {
    committed: Catalog,
    pending: Option<Catalog>,
    writes: usize,
    opened: usize,
    closed: usize,
    rollbacks: usize,
    fail_on_table: Option<String>,
    fail_commit: bool,
    refuse_connections: bool,
}

/// Mimics SQL Server: add fails on an existing property, update fails on a
/// missing one, and writes are only visible to others after commit.
#[derive(Clone, Default)]
struct FakeCatalog {
    state: Arc<Mutex<CatalogState>>,
}

impl FakeCatalog {
    fn committed(&self) -> Catalog {
        self.state.lock().unwrap().committed.clone()
    }

    fn description(&self, table: &str, column: Option<&str>) -> Option<String> {
        self.committed()
            .get(&("dbo".to_string(), table.to_string(), column.map(str::to_string)))
            .cloned()
    }

    fn seed(&self, table: &str, column: Option<&str>, text: &str) {
        self.state.lock().unwrap().committed.insert(
            ("dbo".to_string(), table.to_string(), column.map(str::to_string)),
            text.to_string(),
        );
    }

    fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    fn fail_on(&self, table: &str) {
        self.state.lock().unwrap().fail_on_table = Some(table.to_string());
    }
}

fn slot_key(params: &[&str]) -> (String, String, Option<String>) {
    (
        params[0].to_string(),
        params[1].to_string(),
        params.get(2).map(|c| c.to_string()),
    )
}

#[async_trait]
impl Connector for FakeCatalog {
    async fn open(&self) -> schema_doc_sync::Result<Box<dyn SqlSession>> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connections {
            return Err(SyncError::Connection("login failed".into()));
        }
        state.opened += 1;
        Ok(Box::new(FakeSession {
            catalog: self.clone(),
        }))
    }
}

struct FakeSession {
    catalog: FakeCatalog,
}

#[async_trait]
impl SqlSession for FakeSession {
    async fn begin_transaction(&mut self) -> schema_doc_sync::Result<()> {
        let mut state = self.catalog.state.lock().unwrap();
        state.pending = Some(state.committed.clone());
        Ok(())
    }

    async fn commit(&mut self) -> schema_doc_sync::Result<()> {
        let mut state = self.catalog.state.lock().unwrap();
        if state.fail_commit {
            return Err(SyncError::Transaction("commit lost".into()));
        }
        let pending = state
            .pending
            .take()
            .ok_or_else(|| SyncError::Transaction("no transaction".into()))?;
        state.committed = pending;
        Ok(())
    }

    async fn rollback(&mut self) -> schema_doc_sync::Result<()> {
        let mut state = self.catalog.state.lock().unwrap();
        state.pending = None;
        state.rollbacks += 1;
        Ok(())
    }

    async fn execute(&mut self, sql: &str, params: &[&str]) -> schema_doc_sync::Result<u64> {
        let mut state = self.catalog.state.lock().unwrap();
        let key = slot_key(&params[1..]);
        if state.fail_on_table.as_deref() == Some(key.1.as_str()) {
            return Err(SyncError::sql(sql, "Cannot find the object"));
        }
        let pending = state
            .pending
            .as_mut()
            .ok_or_else(|| SyncError::sql(sql, "no open transaction"))?;

        let exists = pending.contains_key(&key);
        if sql.contains("sp_addextendedproperty") && exists {
            return Err(SyncError::sql(sql, "Property already exists"));
        }
        if sql.contains("sp_updateextendedproperty") && !exists {
            return Err(SyncError::sql(sql, "Property does not exist"));
        }
        pending.insert(key, params[0].to_string());
        state.writes += 1;
        Ok(1)
    }

    async fn query_scalar(
        &mut self,
        _sql: &str,
        params: &[&str],
    ) -> schema_doc_sync::Result<Option<String>> {
        let state = self.catalog.state.lock().unwrap();
        let catalog = state.pending.as_ref().unwrap_or(&state.committed);
        Ok(catalog.get(&slot_key(params)).cloned())
    }

    async fn close(&mut self) -> schema_doc_sync::Result<()> {
        self.catalog.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

const CORPUS: &str = r#"<?xml version="1.0"?>
<doc>
    <assembly><name>Shop</name></assembly>
    <members>
        <member name="T:Shop.Order"><summary>Customer order</summary></member>
        <member name="P:Shop.Order.Id"><summary>Order number</summary></member>
        <member name="P:Shop.Order.Total"><summary>Order total</summary></member>
        <member name="P:Shop.Order.Note"><summary></summary></member>
        <member name="T:Shop.OrderLine"><summary>Line of an order</summary></member>
        <member name="P:Shop.OrderLine.Quantity"><summary>Units ordered</summary></member>
        <member name="T:Shop.Customer"><summary>Buyer</summary></member>
        <member name="P:Shop.Customer.Name"><summary>Display name</summary></member>
        <member name="T:Shop.Product"><summary>Sellable item</summary></member>
        <member name="P:Shop.Product.Sku"><summary>Stock keeping unit</summary></member>
        <member name="T:Shop.Supplier"><summary>Delivers products</summary></member>
        <member name="P:Shop.Supplier.Name"><summary>Company name</summary></member>
    </members>
</doc>"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("schema_doc_sync=debug")
        .try_init();
}

fn registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::builder()
        .define(
            TypeSpec::class("Shop.Order")
                .table("[dbo].[Orders]")
                .property(PropertySpec::new("Id", "long"))
                .property(PropertySpec::new("Total", "decimal"))
                .property(PropertySpec::new("Note", "string"))
                .property(PropertySpec::new("Lines", "List<Shop.OrderLine>")),
        )
        .define(
            TypeSpec::class("Shop.OrderLine")
                .table("OrderLine")
                .property(PropertySpec::new("Quantity", "int")),
        )
        .define(TypeSpec::class("Shop.Customer").property(PropertySpec::new("Name", "string")))
        .define(TypeSpec::class("Shop.Product").property(PropertySpec::new("Sku", "string")))
        .define(TypeSpec::class("Shop.Supplier").property(PropertySpec::new("Name", "string")))
        .define(
            TypeSpec::class("Shop.ShopContext")
                .base("Microsoft.EntityFrameworkCore.DbContext")
                .property(PropertySpec::new(
                    "Orders",
                    "Microsoft.EntityFrameworkCore.DbSet<Shop.Order>",
                ))
                .property(PropertySpec::new(
                    "Lines",
                    "Microsoft.EntityFrameworkCore.DbSet<Shop.OrderLine>",
                ))
                .property(PropertySpec::new(
                    "Customers",
                    "Microsoft.EntityFrameworkCore.DbSet<Shop.Customer>",
                ))
                .property(PropertySpec::new(
                    "Products",
                    "Microsoft.EntityFrameworkCore.DbSet<Shop.Product>",
                ))
                .property(PropertySpec::new(
                    "Suppliers",
                    "Microsoft.EntityFrameworkCore.DbSet<Shop.Supplier>",
                ))
                .property(PropertySpec::new("Name", "string")),
        )
        .build()
        .unwrap();
    Arc::new(registry)
}

fn engine(catalog: &FakeCatalog) -> (SchemaSyncEngine, TypeRef) {
    init_tracing();
    let registry = registry();
    let aggregate = registry.resolve("Shop.ShopContext").unwrap();
    let options = SyncOptions::new(&registry).unwrap();
    let index = Arc::new(DocumentationIndex::from_xml(CORPUS).unwrap());
    (
        SchemaSyncEngine::new(catalog.clone(), registry, index, options),
        aggregate,
    )
}

#[tokio::test]
async fn test_first_run_adds_descriptions() {
    let catalog = FakeCatalog::default();
    let (engine, aggregate) = engine(&catalog);

    let report = engine.sync(&aggregate).await.unwrap();

    assert_eq!(report.aggregate, "Shop.ShopContext");
    assert_eq!(report.tables.len(), 5);
    assert_eq!(report.descriptions_updated, 0);
    assert_eq!(report.descriptions_unchanged, 0);
    assert_eq!(report.descriptions_added, catalog.writes());

    assert_eq!(catalog.description("Orders", None).as_deref(), Some("Customer order"));
    assert_eq!(
        catalog.description("Orders", Some("Total")).as_deref(),
        Some("Order total")
    );
    assert_eq!(
        catalog.description("OrderLine", Some("Quantity")).as_deref(),
        Some("Units ordered")
    );
    assert_eq!(
        catalog.description("Customer", Some("Name")).as_deref(),
        Some("Display name")
    );

    let state = catalog.state.lock().unwrap();
    assert_eq!(state.opened, 1);
    assert_eq!(state.closed, 1);
    assert_eq!(state.rollbacks, 0);
}

#[tokio::test]
async fn test_table_names_follow_override() {
    let catalog = FakeCatalog::default();
    let (engine, aggregate) = engine(&catalog);
    let report = engine.sync(&aggregate).await.unwrap();

    let tables: Vec<&str> = report.tables.iter().map(|t| t.table.as_str()).collect();
    assert_eq!(
        tables,
        vec!["Orders", "OrderLine", "Customer", "Product", "Supplier"]
    );
    assert!(catalog.description("[dbo].[Orders]", None).is_none());
}

#[tokio::test]
async fn test_audit_fallback_wins_over_authored_summary() {
    let catalog = FakeCatalog::default();
    let (engine, aggregate) = engine(&catalog);
    engine.sync(&aggregate).await.unwrap();

    assert_eq!(catalog.description("Orders", Some("Id")).as_deref(), Some("编号"));
}

#[tokio::test]
async fn test_empty_and_missing_descriptions_are_skipped() {
    let catalog = FakeCatalog::default();
    let (engine, aggregate) = engine(&catalog);
    engine.sync(&aggregate).await.unwrap();

    // Note has an empty summary; Lines is a navigation, not a column
    assert!(catalog.description("Orders", Some("Note")).is_none());
    assert!(catalog.description("Orders", Some("Lines")).is_none());
    assert_eq!(catalog.committed().len(), 11);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let catalog = FakeCatalog::default();
    let (engine, aggregate) = engine(&catalog);

    let first = engine.sync(&aggregate).await.unwrap();
    let writes = catalog.writes();
    let snapshot = catalog.committed();

    let second = engine.sync(&aggregate).await.unwrap();
    assert_eq!(catalog.writes(), writes);
    assert_eq!(catalog.committed(), snapshot);
    assert_eq!(second.descriptions_written(), 0);
    assert_eq!(second.descriptions_unchanged, first.descriptions_added);
}

#[tokio::test]
async fn test_changed_description_is_updated() {
    let catalog = FakeCatalog::default();
    catalog.seed("Orders", None, "Old text");
    catalog.seed("Orders", Some("Total"), "Order total");
    let (engine, aggregate) = engine(&catalog);

    let report = engine.sync(&aggregate).await.unwrap();

    assert_eq!(catalog.description("Orders", None).as_deref(), Some("Customer order"));
    let orders = &report.tables[0];
    assert_eq!(orders.table, "Orders");
    assert_eq!(orders.updated, 1);
    assert_eq!(orders.unchanged, 1);
    assert_eq!(orders.added, 1);
    assert_eq!(catalog.committed().len(), 11);
}

#[tokio::test]
async fn test_failure_rolls_back_whole_run() {
    let catalog = FakeCatalog::default();
    catalog.fail_on("Customer");
    let (engine, aggregate) = engine(&catalog);

    let err = engine.sync(&aggregate).await.unwrap_err();

    match &err {
        SyncError::SyncFailed { aggregate, source } => {
            assert_eq!(aggregate, "Shop.ShopContext");
            assert!(matches!(**source, SyncError::SqlExecution { .. }));
        }
        other => panic!("expected SyncFailed, got {:?}", other),
    }
    assert!(err.format_detailed().contains("Cannot find the object"));

    // Orders and OrderLine were written before Customer, the third entity, failed
    let state = catalog.state.lock().unwrap();
    assert_eq!(state.writes, 5);
    assert!(state.committed.is_empty());
    assert!(state.pending.is_none());
    assert_eq!(state.rollbacks, 1);
    assert_eq!(state.closed, 1);
}

#[tokio::test]
async fn test_failed_commit_is_rolled_back() {
    let catalog = FakeCatalog::default();
    catalog.state.lock().unwrap().fail_commit = true;
    let (engine, aggregate) = engine(&catalog);

    let err = engine.sync(&aggregate).await.unwrap_err();

    match err {
        SyncError::SyncFailed { source, .. } => {
            assert!(matches!(*source, SyncError::Transaction(_)))
        }
        other => panic!("expected SyncFailed, got {:?}", other),
    }
    let state = catalog.state.lock().unwrap();
    assert!(state.writes > 0);
    assert!(state.committed.is_empty());
    assert!(state.pending.is_none());
    assert_eq!(state.rollbacks, 1);
    assert_eq!(state.closed, 1);
}

#[tokio::test]
async fn test_connection_failure_is_sync_failure() {
    let catalog = FakeCatalog::default();
    catalog.state.lock().unwrap().refuse_connections = true;
    let (engine, aggregate) = engine(&catalog);

    let err = engine.sync(&aggregate).await.unwrap_err();
    match err {
        SyncError::SyncFailed { source, .. } => {
            assert!(matches!(*source, SyncError::Connection(_)))
        }
        other => panic!("expected SyncFailed, got {:?}", other),
    }
    assert_eq!(catalog.writes(), 0);
}

#[tokio::test]
async fn test_entity_discovery() {
    let catalog = FakeCatalog::default();
    let (engine, aggregate) = engine(&catalog);

    let names: Vec<String> = engine
        .entity_types(&aggregate)
        .iter()
        .map(|e| engine.registry().display(e))
        .collect();
    assert_eq!(
        names,
        vec![
            "Shop.Order",
            "Shop.OrderLine",
            "Shop.Customer",
            "Shop.Product",
            "Shop.Supplier"
        ]
    );

    let order = engine.describe(&engine.entity_types(&aggregate)[0]).unwrap();
    assert_eq!(order.table_name, "Orders");
    assert_eq!(order.table_description.as_deref(), Some("Customer order"));
}

#[tokio::test]
async fn test_report_serializes() {
    let catalog = FakeCatalog::default();
    let (engine, aggregate) = engine(&catalog);
    let report = engine.sync(&aggregate).await.unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["aggregate"], "Shop.ShopContext");
    assert_eq!(json["tables"][0]["table"], "Orders");
    assert_eq!(json["descriptions_added"], 11);
    assert_eq!(
        serde_json::to_value(SlotOutcome::Unchanged).unwrap(),
        serde_json::json!("unchanged")
    );
}
