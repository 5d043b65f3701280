use axum::{routing::{get, post}, Router};

use crate::handler::webhook_handler::{
    read_customers_handler, read_handler, read_notes_templates_handler, read_quotes_handler,
    read_services_handler, send_email_handler, write_customer_handler, write_handler,
    write_quote_handler, WebhookState,
};

/// `/webhook` dispatches on the action or payload shape; the named routes
/// keep the URLs older clients were built against.
pub fn webhook_router(service: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(read_handler).post(write_handler))
        .route("/webhook/read-quotes", get(read_quotes_handler))
        .route("/webhook/write-quote", post(write_quote_handler))
        .route("/webhook/read-customers", get(read_customers_handler))
        .route("/webhook/write-customer", post(write_customer_handler))
        .route("/webhook/read-services", get(read_services_handler))
        .route("/webhook/read-notes-templates", get(read_notes_templates_handler))
        .route("/webhook/send-email", post(send_email_handler))
        .route("/health", get(|| async { "OK" }))
        .with_state(service)
}
