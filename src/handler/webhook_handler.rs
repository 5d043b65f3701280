use axum::{
    body::Bytes,
    extract::{Query, State},
};
use std::sync::Arc;
use tracing::{debug, warn};
use validator::Validate;

use crate::dto::webhook_dto::{QuoteEmailRequest, ReadParams, RecordKind, WebhookResponse};
use crate::model::quotation::Quotation;
use crate::service::webhook_service::WebhookService;
use crate::util::error::{HandlerError, HandlerErrorKind};

pub type WebhookState = Arc<dyn WebhookService>;

pub async fn read_handler(
    State(service): State<WebhookState>,
    Query(params): Query<ReadParams>,
) -> WebhookResponse {
    debug!(action = ?params.action, "Webhook read");
    service.read(params.action.as_deref()).await
}

pub async fn write_handler(State(service): State<WebhookState>, body: Bytes) -> WebhookResponse {
    service.write(&body).await
}

pub async fn read_quotes_handler(State(service): State<WebhookState>) -> WebhookResponse {
    service.read(Some("read_quotes")).await
}

pub async fn read_customers_handler(State(service): State<WebhookState>) -> WebhookResponse {
    service.read(Some("read_customers")).await
}

pub async fn read_services_handler(State(service): State<WebhookState>) -> WebhookResponse {
    service.read(Some("read_services")).await
}

pub async fn read_notes_templates_handler(State(service): State<WebhookState>) -> WebhookResponse {
    service.read(Some("read_notes_templates")).await
}

pub async fn write_quote_handler(State(service): State<WebhookState>, body: Bytes) -> WebhookResponse {
    service.write_as(RecordKind::Quotation, &body).await
}

pub async fn write_customer_handler(State(service): State<WebhookState>, body: Bytes) -> WebhookResponse {
    service.write_as(RecordKind::Customer, &body).await
}

/// Body is the whole quotation, as the UI holds it.
pub async fn send_email_handler(
    State(service): State<WebhookState>,
    body: Bytes,
) -> Result<WebhookResponse, HandlerError> {
    let quotation: Quotation = serde_json::from_slice(&body).map_err(|e| {
        warn!("Invalid quotation payload: {}", e);
        HandlerError {
            error: HandlerErrorKind::BadRequest,
            message: "Invalid quotation payload".to_string(),
            details: Some(e.to_string()),
        }
    })?;
    QuoteEmailRequest::from(&quotation).validate().map_err(HandlerError::validation)?;
    Ok(service.send_quotation_email(quotation).await)
}
