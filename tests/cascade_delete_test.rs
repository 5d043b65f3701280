use quotedesk_backend::config::bank_info_conf::BankInfoConfig;
use quotedesk_backend::repository::quotation_repo::SheetQuotationRepository;
use quotedesk_backend::repository::sheet_schema::{LINE_ITEMS, MILESTONES, QUOTATIONS};
use quotedesk_backend::repository::sheet_store::{InMemorySheetStore, SheetStore};
use quotedesk_backend::service::quotation_service::QuotationServiceImpl;
use quotedesk_backend::service::webhook_service::{WebhookService, WebhookServiceImpl};
use quotedesk_backend::util::write_lock::WriteLock;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<InMemorySheetStore>, WebhookServiceImpl) {
    let store = Arc::new(InMemorySheetStore::new());
    let shared: Arc<dyn SheetStore> = store.clone();
    let repo = Arc::new(SheetQuotationRepository::new(shared.clone()));
    let quotations = Arc::new(QuotationServiceImpl::new(repo, BankInfoConfig::from_test_env(), "ZN", None));
    let service = WebhookServiceImpl::new(shared, quotations, WriteLock::new(Duration::from_secs(1)));
    (store, service)
}

fn quote(id: &str, number: &str, items: usize, milestones: usize) -> Value {
    let items: Vec<Value> = (0..items)
        .map(|i| json!({ "name": format!("Item {}", i + 1), "qty": 1, "price": 1000 }))
        .collect();
    let milestones: Vec<Value> = (0..milestones)
        .map(|i| json!({ "week": format!("W{}", i + 1), "title": "Phase", "tasks": "plan, build" }))
        .collect();
    json!({
        "action": "save_quote",
        "id": id,
        "quoteNumber": number,
        "clientName": "Acme",
        "createdAt": "2026-03-01",
        "items": items,
        "milestones": milestones
    })
}

async fn write(service: &WebhookServiceImpl, body: Value) -> Value {
    let response = service.write(body.to_string().as_bytes()).await;
    serde_json::to_value(response).unwrap()
}

#[tokio::test]
async fn test_cascade_delete_removes_quote_items_and_milestones() {
    let (store, service) = setup();
    assert_eq!(write(&service, quote("Q1", "ZN-2026-001", 2, 1)).await["success"], json!(true));
    assert_eq!(write(&service, quote("Q2", "ZN-2026-002", 1, 2)).await["success"], json!(true));

    let body = write(&service, json!({ "action": "delete_quote", "id": "Q1" })).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], json!("Deleted successfully"));
    assert_eq!(body["targetId"], json!("Q1"));
    assert_eq!(body["deleted"], json!({ "quote": 1, "items": 2, "milestones": 1 }));

    for (sheet, expected) in [(QUOTATIONS.name, 1), (LINE_ITEMS.name, 1), (MILESTONES.name, 2)] {
        let rows = store.raw_rows(sheet).await;
        assert_eq!(rows.len(), expected, "rows left in {}", sheet);
        assert!(rows.iter().all(|row| row[0] == json!("Q2")));
    }

    let listed = serde_json::to_value(service.read(Some("read_quotes")).await).unwrap();
    let quotes = listed["data"].as_array().unwrap();
    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0]["id"], json!("Q2"));
}

#[tokio::test]
async fn test_cascade_delete_of_unknown_quote_counts_zero() {
    let (_, service) = setup();
    let body = write(&service, json!({ "action": "delete_quote", "id": "Q404" })).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["deleted"], json!({ "quote": 0, "items": 0, "milestones": 0 }));
}

#[tokio::test]
async fn test_cascade_delete_without_id_fails() {
    let (_, service) = setup();
    let body = write(&service, json!({ "action": "delete_quote" })).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("MissingRequiredField"));
}

#[tokio::test]
async fn test_saved_quote_reads_back_with_bank_defaults() {
    let (_, service) = setup();
    write(&service, quote("Q1", "ZN-2026-001", 2, 0)).await;

    let listed = serde_json::to_value(service.read(Some("read_quotes")).await).unwrap();
    let quote = &listed["data"][0];
    assert_eq!(quote["items"].as_array().unwrap().len(), 2);
    assert_eq!(quote["bankInfo"]["bankCode"], json!("812"));
}

#[tokio::test]
async fn test_quote_number_generated_when_blank() {
    let (_, service) = setup();
    write(&service, quote("Q1", "ZN-2026-001", 1, 0)).await;
    let body = write(&service, quote("Q2", "", 1, 0)).await;
    assert_eq!(body["success"], json!(true));

    let listed = serde_json::to_value(service.read(Some("read_quotes")).await).unwrap();
    let numbers: Vec<&str> = listed["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["quoteNumber"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["ZN-2026-001", "ZN-2026-002"]);
}

#[tokio::test]
async fn test_resave_without_number_keeps_assigned_number() {
    let (store, service) = setup();
    let mut draft = quote("Q1", "", 1, 0);
    draft["createdAt"] = json!("2026-02-01");
    assert_eq!(write(&service, draft.clone()).await["message"], json!("Quotation created"));

    draft["clientName"] = json!("Acme Ltd");
    assert_eq!(write(&service, draft).await["message"], json!("Quotation updated"));

    assert_eq!(store.raw_rows(QUOTATIONS.name).await.len(), 1);
    let listed = serde_json::to_value(service.read(Some("read_quotes")).await).unwrap();
    assert_eq!(listed["data"][0]["quoteNumber"], json!("ZN-2026-001"));
    assert_eq!(listed["data"][0]["clientName"], json!("Acme Ltd"));

    let body = write(&service, quote("Q2", "", 1, 0)).await;
    assert_eq!(body["success"], json!(true));
    let listed = serde_json::to_value(service.read(Some("read_quotes")).await).unwrap();
    assert_eq!(listed["data"][1]["quoteNumber"], json!("ZN-2026-002"));
}

#[tokio::test]
async fn test_cascade_delete_of_orphaned_items_only() {
    let (store, service) = setup();
    store.create_sheet(&LINE_ITEMS).await.unwrap();
    for (key, name) in [("Q1", "Design"), ("Q2", "Hosting"), ("Q1", "Build")] {
        let row = vec![json!(key), json!(name), json!(""), json!(1), json!("式"), json!(100), json!(100)];
        store.append_row(LINE_ITEMS.name, row).await.unwrap();
    }

    let body = write(&service, json!({ "action": "delete_quote", "id": " Q1 " })).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["targetId"], json!("Q1"));
    assert_eq!(body["deleted"], json!({ "quote": 0, "items": 2, "milestones": 0 }));

    let rows = store.raw_rows(LINE_ITEMS.name).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], json!("Q2"));
    assert!(!store.sheet_exists(MILESTONES.name).await.unwrap());
}

#[tokio::test]
async fn test_legacy_rows_read_and_delete_by_key() {
    let (store, service) = setup();
    store.create_sheet(&QUOTATIONS).await.unwrap();
    let legacy: Vec<Value> = [
        "ZN-2025-014", "C001", "Acme", "Bob", "", "", "", "Site", "web", "5", "sent", "2025-11-02", "", "", "",
    ]
    .iter()
    .map(|cell| json!(cell))
    .collect();
    store.append_row(QUOTATIONS.name, legacy).await.unwrap();

    let listed = serde_json::to_value(service.read(Some("read_quotes")).await).unwrap();
    let quote = &listed["data"][0];
    assert_eq!(quote["id"], json!("ZN-2025-014"));
    assert_eq!(quote["quoteNumber"], json!("ZN-2025-014"));
    assert_eq!(quote["customerId"], json!("C001"));
    assert_eq!(quote["status"], json!("sent"));

    let body = write(&service, json!({ "action": "delete_quote", "id": "ZN-2025-014" })).await;
    assert_eq!(body["deleted"]["quote"], json!(1));
    assert!(store.raw_rows(QUOTATIONS.name).await.is_empty());
}
