use crate::dto::webhook_dto::{classify, RecordKind, WebhookResponse, WriteOperation};
use crate::model::customer::Customer;
use crate::model::note_template::NoteTemplate;
use crate::model::quotation::Quotation;
use crate::model::service_item::ServiceItem;
use crate::repository::record_repo::{RecordRepository, SheetRecordRepository};
use crate::repository::sheet_store::SheetStore;
use crate::service::quotation_service::QuotationService;
use crate::util::coerce::{cell_key, is_truthy};
use crate::util::error::ServiceError;
use crate::util::write_lock::WriteLock;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Read action used when the query names none.
pub const DEFAULT_READ_ACTION: &str = "read_notes_templates";

/// Single entry point for webhook reads and writes.
///
/// Every method answers with a [`WebhookResponse`]; failures are folded into
/// `{success:false}` bodies instead of being returned.
#[async_trait]
pub trait WebhookService: Send + Sync {
    async fn read(&self, action: Option<&str>) -> WebhookResponse;
    /// Classify the payload by shape and apply it under the write lock.
    async fn write(&self, body: &[u8]) -> WebhookResponse;
    /// Apply a payload whose family is fixed by the route it arrived on.
    async fn write_as(&self, kind: RecordKind, body: &[u8]) -> WebhookResponse;
    async fn send_quotation_email(&self, quotation: Quotation) -> WebhookResponse;
}

pub struct WebhookServiceImpl {
    customers: Arc<dyn RecordRepository<Customer>>,
    services: Arc<dyn RecordRepository<ServiceItem>>,
    templates: Arc<dyn RecordRepository<NoteTemplate>>,
    quotations: Arc<dyn QuotationService>,
    lock: WriteLock,
}

fn parse_body(body: &[u8]) -> Result<Value, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ServiceError::InvalidPayload("No data received".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| ServiceError::InvalidPayload(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ServiceError> {
    serde_json::from_value(body).map_err(|e| ServiceError::InvalidPayload(e.to_string()))
}

fn to_data<T: Serialize>(records: &[T]) -> Result<Value, ServiceError> {
    serde_json::to_value(records).map_err(|e| ServiceError::InternalError(e.to_string()))
}

fn target_id(body: &Value) -> String {
    body.get("id").map(cell_key).unwrap_or_default()
}

impl WebhookServiceImpl {
    pub fn new(store: Arc<dyn SheetStore>, quotations: Arc<dyn QuotationService>, lock: WriteLock) -> Self {
        Self {
            customers: Arc::new(SheetRecordRepository::<Customer>::new(store.clone())),
            services: Arc::new(SheetRecordRepository::<ServiceItem>::new(store.clone())),
            templates: Arc::new(SheetRecordRepository::<NoteTemplate>::new(store)),
            quotations,
            lock,
        }
    }

    pub fn lock(&self) -> &WriteLock {
        &self.lock
    }

    async fn read_data(&self, action: &str) -> Result<Value, ServiceError> {
        match action {
            "read_notes_templates" => to_data(&self.templates.list_all().await?),
            "read_services" => to_data(&self.services.list_all().await?),
            "read_customers" => to_data(&self.customers.list_all().await?),
            "read_quotes" => to_data(&self.quotations.list_quotations().await?),
            other => Err(ServiceError::UnknownAction(format!("unknown read action '{}'", other))),
        }
    }

    async fn apply(&self, operation: WriteOperation, body: Value) -> Result<WebhookResponse, ServiceError> {
        match operation {
            WriteOperation::Upsert(kind) => {
                let outcome = match kind {
                    RecordKind::Customer => self.customers.upsert(decode(body)?).await?,
                    RecordKind::Service => self.services.upsert(decode(body)?).await?,
                    RecordKind::NoteTemplate => self.templates.upsert(decode(body)?).await?,
                    RecordKind::Quotation => self.quotations.save_quotation(decode(body)?).await?,
                };
                Ok(WebhookResponse::upserted(kind, outcome))
            }
            WriteOperation::Delete(kind) => {
                let id = target_id(&body);
                let outcome = match kind {
                    RecordKind::Quotation => {
                        let result = self.quotations.delete_quotation(&id).await?;
                        return Ok(WebhookResponse::cascade(&id, result));
                    }
                    RecordKind::Customer => self.customers.delete(&id).await?,
                    RecordKind::Service => self.services.delete(&id).await?,
                    RecordKind::NoteTemplate => self.templates.delete(&id).await?,
                };
                Ok(WebhookResponse::deleted_rows(kind, outcome.deleted))
            }
        }
    }

    /// Take the lock, parse, pick the operation and apply it. The guard
    /// lives until this returns.
    async fn locked_write<F>(&self, body: &[u8], choose: F) -> Result<WebhookResponse, ServiceError>
    where
        F: FnOnce(&Value) -> Result<WriteOperation, ServiceError> + Send,
    {
        let _guard = self.lock.acquire().await?;
        let body = parse_body(body)?;
        let operation = choose(&body)?;
        info!(?operation, "Applying write");
        self.apply(operation, body).await
    }
}

fn log_failure(response: &WebhookResponse) {
    if !response.success {
        match response.code.as_deref() {
            Some("InternalError") => error!(error = ?response.error, "Webhook request failed"),
            _ => warn!(code = ?response.code, error = ?response.error, "Webhook request rejected"),
        }
    }
}

#[async_trait]
impl WebhookService for WebhookServiceImpl {
    #[instrument(skip(self))]
    async fn read(&self, action: Option<&str>) -> WebhookResponse {
        let action = action.map(str::trim).filter(|a| !a.is_empty()).unwrap_or(DEFAULT_READ_ACTION);
        let response: WebhookResponse = self.read_data(action).await.map(WebhookResponse::data).into();
        log_failure(&response);
        response
    }

    #[instrument(skip(self, body), fields(bytes = body.len()))]
    async fn write(&self, body: &[u8]) -> WebhookResponse {
        let response: WebhookResponse = self.locked_write(body, classify).await.into();
        log_failure(&response);
        response
    }

    #[instrument(skip(self, body), fields(bytes = body.len()))]
    async fn write_as(&self, kind: RecordKind, body: &[u8]) -> WebhookResponse {
        let choose = move |body: &Value| -> Result<WriteOperation, ServiceError> {
            let object: &Map<String, Value> = body
                .as_object()
                .ok_or_else(|| ServiceError::InvalidPayload("expected a JSON object".to_string()))?;
            let deleting = is_truthy(object.get("_delete"))
                || (kind == RecordKind::Quotation
                    && object.get("action").and_then(Value::as_str) == Some("delete_quote"));
            Ok(if deleting { WriteOperation::Delete(kind) } else { WriteOperation::Upsert(kind) })
        };
        let response: WebhookResponse = self.locked_write(body, choose).await.into();
        log_failure(&response);
        response
    }

    #[instrument(skip(self, quotation), fields(quote_number = %quotation.quote_number))]
    async fn send_quotation_email(&self, quotation: Quotation) -> WebhookResponse {
        let response: WebhookResponse = self
            .quotations
            .send_quotation_email(quotation)
            .await
            .map(|to| WebhookResponse::message(format!("Quotation sent to {}", to)))
            .into();
        log_failure(&response);
        response
    }
}
