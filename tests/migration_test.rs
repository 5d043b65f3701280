use async_trait::async_trait;
use bson::Bson;
use quotedesk_backend::repository::document_store::{DocumentStore, InMemoryDocumentStore};
use quotedesk_backend::service::migration_service::{
    EntityCounts, EntityKind, LegacySource, MigrationError, MigrationService, MigrationStage,
};
use quotedesk_backend::util::quotation_api::ApiError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct StubSource {
    records: HashMap<EntityKind, Vec<Value>>,
    failing: Option<EntityKind>,
}

#[async_trait]
impl LegacySource for StubSource {
    async fn fetch(&self, kind: EntityKind) -> Result<Vec<Value>, ApiError> {
        if self.failing == Some(kind) {
            return Err(ApiError::Status { status: 500, body: "boom".to_string() });
        }
        Ok(self.records.get(&kind).cloned().unwrap_or_default())
    }
}

fn legacy_data() -> HashMap<EntityKind, Vec<Value>> {
    HashMap::from([
        (
            EntityKind::Customers,
            vec![
                json!({ "id": "C001", "name": "Acme", "contact": "Bob" }),
                json!({ "id": "C002", "name": "Globex", "contact": "Ann" }),
            ],
        ),
        (EntityKind::Services, vec![json!({ "id": "s1", "name": "Hosting", "unit": "月", "price": "500" })]),
        (EntityKind::NoteTemplates, vec![]),
        (
            EntityKind::Quotations,
            vec![
                json!({ "id": "Q1", "quoteNumber": "ZN-2026-001", "taxRate": 0,
                        "items": [{ "name": "Design", "qty": "2", "price": "1500" }] }),
                json!({ "id": "Q2", "quoteNumber": "ZN-2026-002", "taxRate": 10 }),
                json!({ "quoteNumber": "ZN-2026-003" }),
            ],
        ),
    ])
}

fn service(source: StubSource, target: Arc<InMemoryDocumentStore>, batch_size: usize) -> MigrationService {
    MigrationService::new(Arc::new(source), target as Arc<dyn DocumentStore>, batch_size)
}

#[tokio::test]
async fn test_migration_copies_every_record_with_id() {
    let target = Arc::new(InMemoryDocumentStore::new());
    let migration = service(StubSource { records: legacy_data(), failing: None }, target.clone(), 500);

    let stages = Mutex::new(Vec::new());
    let record = |stage: &MigrationStage| stages.lock().unwrap().push(stage.clone());
    let report = migration.run(&record).await.expect("migration");

    assert_eq!(report.customers, EntityCounts { fetched: 2, written: 2, skipped: 0 });
    assert_eq!(report.services, EntityCounts { fetched: 1, written: 1, skipped: 0 });
    assert_eq!(report.note_templates, EntityCounts::default());
    assert_eq!(report.quotations, EntityCounts { fetched: 3, written: 2, skipped: 1 });
    assert_eq!(report.total_written(), 5);

    assert_eq!(target.count("customers").await, 2);
    assert_eq!(target.count("services").await, 1);
    assert_eq!(target.count("notesTemplates").await, 0);
    assert_eq!(target.count("quotations").await, 2);
    assert_eq!(target.commit_count(), 1);

    let stages = stages.into_inner().unwrap();
    assert_eq!(stages.first(), Some(&MigrationStage::Fetching(EntityKind::Customers)));
    assert!(matches!(stages.last(), Some(MigrationStage::Done(_))));
}

#[tokio::test]
async fn test_migration_normalizes_numbers_and_stamps() {
    let target = Arc::new(InMemoryDocumentStore::new());
    let migration = service(StubSource { records: legacy_data(), failing: None }, target.clone(), 500);
    migration.run(&|_: &MigrationStage| {}).await.unwrap();

    let service_doc = target.get("services", "s1").await.unwrap();
    assert_eq!(service_doc.get("price"), Some(&Bson::Int64(500)));
    assert!(matches!(service_doc.get("migratedAt"), Some(Bson::DateTime(_))));
    assert!(service_doc.get("updatedAt").is_none());

    let q1 = target.get("quotations", "Q1").await.unwrap();
    assert_eq!(q1.get("taxRate"), Some(&Bson::Int64(5)));
    let items = q1.get_array("items").unwrap();
    let item = items[0].as_document().unwrap();
    assert_eq!(item.get("qty"), Some(&Bson::Int64(2)));
    assert_eq!(item.get("price"), Some(&Bson::Int64(1500)));
    assert!(matches!(q1.get("updatedAt"), Some(Bson::DateTime(_))));
    assert_eq!(q1.get_str("_id").unwrap(), "Q1");

    let q2 = target.get("quotations", "Q2").await.unwrap();
    assert_eq!(q2.get("taxRate"), Some(&Bson::Int64(10)));
    assert!(q2.get_array("items").unwrap().is_empty());
    assert_eq!(q1.get_datetime("migratedAt").unwrap(), q2.get_datetime("migratedAt").unwrap());

    let customer = target.get("customers", "C001").await.unwrap();
    assert!(matches!(customer.get("updatedAt"), Some(Bson::DateTime(_))));
}

#[tokio::test]
async fn test_migration_commits_in_batches() {
    let target = Arc::new(InMemoryDocumentStore::new());
    let migration = service(StubSource { records: legacy_data(), failing: None }, target.clone(), 2);
    let report = migration.run(&|_: &MigrationStage| {}).await.unwrap();
    assert_eq!(report.total_written(), 5);
    assert_eq!(target.commit_count(), 3);
}

#[tokio::test]
async fn test_rejected_commit_writes_nothing() {
    let target = Arc::new(InMemoryDocumentStore::new());
    target.reject_commits(true);
    let migration = service(StubSource { records: legacy_data(), failing: None }, target.clone(), 500);

    let failures = Mutex::new(Vec::new());
    let record = |stage: &MigrationStage| {
        if let MigrationStage::Failed(reason) = stage {
            failures.lock().unwrap().push(reason.clone());
        }
    };
    let err = migration.run(&record).await.unwrap_err();
    assert!(matches!(err, MigrationError::Commit { batch: 1, batches: 1, .. }));
    assert!(err.to_string().contains("commit rejected by store"));
    assert_eq!(failures.into_inner().unwrap().len(), 1);

    for collection in ["customers", "services", "quotations"] {
        assert_eq!(target.count(collection).await, 0);
    }
}

#[tokio::test]
async fn test_fetch_failure_aborts_before_any_write() {
    let target = Arc::new(InMemoryDocumentStore::new());
    let source = StubSource { records: legacy_data(), failing: Some(EntityKind::Quotations) };
    let migration = service(source, target.clone(), 500);

    let err = migration.run(&|_: &MigrationStage| {}).await.unwrap_err();
    assert!(matches!(err, MigrationError::Fetch { kind: EntityKind::Quotations, .. }));
    assert_eq!(target.commit_count(), 0);
    assert_eq!(target.count("customers").await, 0);
}

#[tokio::test]
async fn test_rerun_replaces_documents_by_id() {
    let target = Arc::new(InMemoryDocumentStore::new());
    let first = service(StubSource { records: legacy_data(), failing: None }, target.clone(), 500);
    let first_report = first.run(&|_: &MigrationStage| {}).await.unwrap();
    let first_stamp = *target.get("quotations", "Q1").await.unwrap().get_datetime("migratedAt").unwrap();

    let mut records = legacy_data();
    records.insert(
        EntityKind::Services,
        vec![json!({ "id": "s1", "name": "Hosting", "unit": "月", "price": "650" })],
    );
    let second = service(StubSource { records, failing: None }, target.clone(), 500);
    let second_report = second.run(&|_: &MigrationStage| {}).await.unwrap();

    assert_eq!(first_report, second_report);
    assert_eq!(target.commit_count(), 2);
    assert_eq!(target.count("customers").await, 2);
    assert_eq!(target.count("services").await, 1);
    assert_eq!(target.count("quotations").await, 2);

    let service_doc = target.get("services", "s1").await.unwrap();
    assert_eq!(service_doc.get("price"), Some(&Bson::Int64(650)));
    let second_stamp = *target.get("quotations", "Q1").await.unwrap().get_datetime("migratedAt").unwrap();
    assert!(second_stamp >= first_stamp);
}
