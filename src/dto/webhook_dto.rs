use crate::model::quotation::Quotation;
use crate::repository::quotation_repo::CascadeDeleteResult;
use crate::repository::record_repo::{UpsertAction, UpsertOutcome};
use crate::util::coerce::is_truthy;
use crate::util::error::ServiceError;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Entity family a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Customer,
    Service,
    NoteTemplate,
    Quotation,
}

impl RecordKind {
    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Customer => "Customer",
            RecordKind::Service => "Service",
            RecordKind::NoteTemplate => "Note template",
            RecordKind::Quotation => "Quotation",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a write request asks for once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Upsert(RecordKind),
    Delete(RecordKind),
}

impl WriteOperation {
    fn of(kind: RecordKind, body: &Map<String, Value>) -> Self {
        if is_truthy(body.get("_delete")) {
            WriteOperation::Delete(kind)
        } else {
            WriteOperation::Upsert(kind)
        }
    }
}

/// Values accepted by the explicit `kind` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExplicitKind {
    Record(RecordKind),
    DeleteQuote,
}

impl FromStr for ExplicitKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "customer" => Ok(ExplicitKind::Record(RecordKind::Customer)),
            "service" => Ok(ExplicitKind::Record(RecordKind::Service)),
            "note_template" => Ok(ExplicitKind::Record(RecordKind::NoteTemplate)),
            "quotation" => Ok(ExplicitKind::Record(RecordKind::Quotation)),
            "delete_quote" => Ok(ExplicitKind::DeleteQuote),
            other => Err(ServiceError::UnknownAction(format!("unknown kind '{}'", other))),
        }
    }
}

fn action_is(body: &Map<String, Value>, action: &str) -> bool {
    body.get("action").and_then(Value::as_str) == Some(action)
}

fn id_starts_with(body: &Map<String, Value>, prefix: &str) -> bool {
    body.get("id").and_then(Value::as_str).is_some_and(|id| id.starts_with(prefix))
}

/// Decide which operation a write payload asks for.
///
/// An explicit `kind` field wins. Without it the legacy shape rules apply in
/// this order, first match wins:
///
/// 1. `action == "delete_quote"`
/// 2. `action == "save_quote"`
/// 3. customer: id starts with `C`, or both `name` and `contact` are truthy
/// 4. service: id starts with `s`, or `name` and `unit` are truthy and `price` is present
/// 5. note template: `action == "save_note_template"` or a truthy `label`
///
/// A truthy `_delete` turns any family into a delete.
pub fn classify(body: &Value) -> Result<WriteOperation, ServiceError> {
    let body = body
        .as_object()
        .ok_or_else(|| ServiceError::InvalidPayload("expected a JSON object".to_string()))?;

    if let Some(kind) = body.get("kind").and_then(Value::as_str).filter(|k| !k.trim().is_empty()) {
        return Ok(match kind.parse::<ExplicitKind>()? {
            ExplicitKind::DeleteQuote => WriteOperation::Delete(RecordKind::Quotation),
            ExplicitKind::Record(kind) => WriteOperation::of(kind, body),
        });
    }

    if action_is(body, "delete_quote") {
        return Ok(WriteOperation::Delete(RecordKind::Quotation));
    }
    if action_is(body, "save_quote") {
        return Ok(WriteOperation::of(RecordKind::Quotation, body));
    }
    if id_starts_with(body, "C") || (is_truthy(body.get("name")) && is_truthy(body.get("contact"))) {
        return Ok(WriteOperation::of(RecordKind::Customer, body));
    }
    if id_starts_with(body, "s")
        || (is_truthy(body.get("name")) && is_truthy(body.get("unit")) && body.contains_key("price"))
    {
        return Ok(WriteOperation::of(RecordKind::Service, body));
    }
    if action_is(body, "save_note_template") || is_truthy(body.get("label")) {
        return Ok(WriteOperation::of(RecordKind::NoteTemplate, body));
    }
    Err(ServiceError::UnknownAction("payload matches no known record shape".to_string()))
}

/// Query of the read entry point.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadParams {
    pub action: Option<String>,
}

/// `deleted` is a plain count, or per-table counts for a cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Deleted {
    Rows(usize),
    Cascade(CascadeDeleteResult),
}

/// Body of every webhook answer. Always sent with status 200.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<UpsertAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<Deleted>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl WebhookResponse {
    pub fn data(data: Value) -> Self {
        WebhookResponse { success: true, data: Some(data), ..Default::default() }
    }

    pub fn message<T: Into<String>>(message: T) -> Self {
        WebhookResponse { success: true, message: Some(message.into()), ..Default::default() }
    }

    pub fn upserted(kind: RecordKind, outcome: UpsertOutcome) -> Self {
        let verb = match outcome.action {
            UpsertAction::Created => "created",
            UpsertAction::Updated => "updated",
        };
        WebhookResponse {
            success: true,
            message: Some(format!("{} {}", kind, verb)),
            id: Some(outcome.id),
            action: Some(outcome.action),
            ..Default::default()
        }
    }

    pub fn deleted_rows(kind: RecordKind, deleted: usize) -> Self {
        WebhookResponse {
            success: true,
            message: Some(format!("{} deleted", kind)),
            deleted: Some(Deleted::Rows(deleted)),
            ..Default::default()
        }
    }

    pub fn cascade(target_id: &str, result: CascadeDeleteResult) -> Self {
        WebhookResponse {
            success: true,
            message: Some("Deleted successfully".to_string()),
            deleted: Some(Deleted::Cascade(result)),
            target_id: Some(target_id.trim().to_string()),
            ..Default::default()
        }
    }

    pub fn failure(err: &ServiceError) -> Self {
        WebhookResponse {
            success: false,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
            ..Default::default()
        }
    }
}

impl From<Result<WebhookResponse, ServiceError>> for WebhookResponse {
    fn from(result: Result<WebhookResponse, ServiceError>) -> Self {
        result.unwrap_or_else(|err| WebhookResponse::failure(&err))
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Recipient check for the quotation e-mail route.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuoteEmailRequest {
    #[validate(email)]
    pub to: String,

    #[validate(length(min = 1, max = 100))]
    pub quote_number: String,
}

impl From<&Quotation> for QuoteEmailRequest {
    fn from(quotation: &Quotation) -> Self {
        QuoteEmailRequest {
            to: quotation.client_email.trim().to_string(),
            quote_number: quotation.quote_number.trim().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(body: Value) -> WriteOperation {
        classify(&body).unwrap()
    }

    #[test]
    fn test_delete_quote_wins_over_customer_shape() {
        let body = json!({ "action": "delete_quote", "id": "C001", "name": "Acme", "contact": "Bob" });
        assert_eq!(op(body), WriteOperation::Delete(RecordKind::Quotation));
    }

    #[test]
    fn test_customer_wins_over_service_shape() {
        let body = json!({ "name": "Acme", "contact": "Bob", "unit": "式", "price": 100 });
        assert_eq!(op(body), WriteOperation::Upsert(RecordKind::Customer));
    }

    #[test]
    fn test_service_wins_over_note_template() {
        let body = json!({ "id": "s9", "label": "Payment terms" });
        assert_eq!(op(body), WriteOperation::Upsert(RecordKind::Service));
    }

    #[test]
    fn test_customer_prefix_is_case_sensitive() {
        let body = json!({ "id": "c001", "label": "x" });
        assert_eq!(op(body), WriteOperation::Upsert(RecordKind::NoteTemplate));
    }

    #[test]
    fn test_service_shape_needs_price_key() {
        assert_eq!(
            op(json!({ "name": "Hosting", "unit": "月", "price": null })),
            WriteOperation::Upsert(RecordKind::Service)
        );
        assert!(classify(&json!({ "name": "Hosting", "unit": "月" })).is_err());
    }

    #[test]
    fn test_falsy_values_do_not_match() {
        let err = classify(&json!({ "name": "Acme", "contact": "", "label": 0 })).unwrap_err();
        assert_eq!(err.code(), "UnknownAction");
    }

    #[test]
    fn test_delete_flag() {
        assert_eq!(op(json!({ "id": "C001", "_delete": true })), WriteOperation::Delete(RecordKind::Customer));
        assert_eq!(op(json!({ "id": "C001", "_delete": false })), WriteOperation::Upsert(RecordKind::Customer));
    }

    #[test]
    fn test_explicit_kind_overrides_shape() {
        let body = json!({ "kind": "note_template", "id": "C001", "name": "Acme", "contact": "Bob" });
        assert_eq!(op(body), WriteOperation::Upsert(RecordKind::NoteTemplate));
        assert_eq!(op(json!({ "kind": "delete_quote", "id": "Q1" })), WriteOperation::Delete(RecordKind::Quotation));
        assert!(classify(&json!({ "kind": "invoice" })).is_err());
    }

    #[test]
    fn test_save_quote_action() {
        assert_eq!(op(json!({ "action": "save_quote", "id": "Q1" })), WriteOperation::Upsert(RecordKind::Quotation));
    }

    #[test]
    fn test_non_object_payload() {
        assert_eq!(classify(&json!([1, 2])).unwrap_err().code(), "InvalidPayload");
    }

    #[test]
    fn test_cascade_response_shape() {
        let response = WebhookResponse::cascade(" Q1 ", CascadeDeleteResult { quote: 1, items: 2, milestones: 1 });
        let body = serde_json::to_value(response).unwrap();
        assert_eq!(body["deleted"], json!({ "quote": 1, "items": 2, "milestones": 1 }));
        assert_eq!(body["targetId"], json!("Q1"));
        assert!(body.get("error").is_none());
    }

    #[test]
    fn test_email_request_validation() {
        let quotation = Quotation { client_email: "not-an-email".into(), quote_number: "ZN-2026-001".into(), ..Default::default() };
        assert!(QuoteEmailRequest::from(&quotation).validate().is_err());
    }
}
