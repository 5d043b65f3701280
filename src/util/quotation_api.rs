//! HTTP client for the quotation webhook, as used by UIs and the migration.
//!
//! Every public call settles into an [`ApiResult`]: network failures,
//! non-2xx statuses, unparsable bodies and `{success:false}` answers all
//! become [`ApiResult::Failure`] and are logged, never raised.

use crate::config::quotation_api_conf::QuotationApiConfig;
use crate::model::customer::Customer;
use crate::model::note_template::NoteTemplate;
use crate::model::quotation::Quotation;
use crate::model::service_item::ServiceItem;
use crate::util::coerce::{cell_text, lenient_string};
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, warn};

pub const READ_QUOTES: &str = "read-quotes";
pub const WRITE_QUOTE: &str = "write-quote";
pub const READ_CUSTOMERS: &str = "read-customers";
pub const WRITE_CUSTOMER: &str = "write-customer";
pub const READ_SERVICES: &str = "read-services";
pub const READ_NOTES_TEMPLATES: &str = "read-notes-templates";
pub const SEND_EMAIL: &str = "send-email";
pub const LOOKUP_TAX_ID: &str = "lookup-taxid";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    Parse(String),

    /// The server answered `{success:false, error}`.
    #[error("{0}")]
    Server(String),
}

/// Outcome of a facade call. Serializes as `{success:true, data}` or
/// `{success:false, error}`.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T> {
    Success(T),
    Failure(String),
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success(_))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ApiResult::Success(_) => None,
            ApiResult::Failure(error) => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            ApiResult::Success(data) => Ok(data),
            ApiResult::Failure(error) => Err(error),
        }
    }
}

impl<T: Default> ApiResult<T> {
    /// The data, or an empty value when the call failed.
    pub fn data_or_default(self) -> T {
        match self {
            ApiResult::Success(data) => data,
            ApiResult::Failure(_) => T::default(),
        }
    }
}

impl<T: Serialize> Serialize for ApiResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ApiResult", 2)?;
        match self {
            ApiResult::Success(data) => {
                state.serialize_field("success", &true)?;
                state.serialize_field("data", data)?;
            }
            ApiResult::Failure(error) => {
                state.serialize_field("success", &false)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

/// Acknowledgement of a write.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WriteAck {
    #[serde(deserialize_with = "lenient_string")]
    pub message: String,
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
}

pub struct QuotationApiClient {
    client: reqwest::Client,
    config: QuotationApiConfig,
}

fn settle<T>(operation: &str, result: Result<T, ApiError>) -> ApiResult<T> {
    match result {
        Ok(data) => ApiResult::Success(data),
        Err(err) => {
            warn!(operation, "Quotation API call failed: {}", err);
            ApiResult::Failure(err.to_string())
        }
    }
}

fn data_list<T: DeserializeOwned>(body: Value) -> Result<Vec<T>, ApiError> {
    match body.get("data") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(data) => serde_json::from_value(data.clone()).map_err(|e| ApiError::Parse(e.to_string())),
    }
}

fn ack(body: Value) -> Result<WriteAck, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Parse(e.to_string()))
}

impl QuotationApiClient {
    pub fn new(config: QuotationApiConfig) -> Self {
        Self { client: reqwest::Client::new(), config }
    }

    pub fn with_client(client: reqwest::Client, config: QuotationApiConfig) -> Self {
        Self { client, config }
    }

    /// Send one request and return the body of a `{success:true}` answer.
    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), body: text });
        }
        let body: Value = serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))?;
        if body.get("success").and_then(Value::as_bool) == Some(true) {
            return Ok(body);
        }
        let error = body
            .get("error")
            .map(cell_text)
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "Request failed".to_string());
        Err(ApiError::Server(error))
    }

    async fn get(&self, endpoint: &str) -> Result<Value, ApiError> {
        let url = self.config.endpoint(endpoint);
        debug!(%url, "GET");
        self.call(self.client.get(url)).await
    }

    async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value, ApiError> {
        let url = self.config.endpoint(endpoint);
        debug!(%url, "POST");
        self.call(self.client.post(url).json(body)).await
    }

    /// Untyped records of a read endpoint.
    pub async fn fetch_raw(&self, endpoint: &str) -> Result<Vec<Value>, ApiError> {
        data_list(self.get(endpoint).await?)
    }

    pub async fn fetch_quotes(&self) -> ApiResult<Vec<Quotation>> {
        settle("fetch_quotes", async { data_list(self.get(READ_QUOTES).await?) }.await)
    }

    pub async fn save_quote(&self, quotation: &Quotation) -> ApiResult<WriteAck> {
        settle("save_quote", async { ack(self.post(WRITE_QUOTE, quotation).await?) }.await)
    }

    pub async fn fetch_customers(&self) -> ApiResult<Vec<Customer>> {
        settle("fetch_customers", async { data_list(self.get(READ_CUSTOMERS).await?) }.await)
    }

    pub async fn save_customer(&self, customer: &Customer) -> ApiResult<WriteAck> {
        settle("save_customer", async { ack(self.post(WRITE_CUSTOMER, customer).await?) }.await)
    }

    pub async fn fetch_services(&self) -> ApiResult<Vec<ServiceItem>> {
        settle("fetch_services", async { data_list(self.get(READ_SERVICES).await?) }.await)
    }

    pub async fn fetch_note_templates(&self) -> ApiResult<Vec<NoteTemplate>> {
        settle("fetch_note_templates", async { data_list(self.get(READ_NOTES_TEMPLATES).await?) }.await)
    }

    pub async fn send_quote_email(&self, quotation: &Quotation) -> ApiResult<WriteAck> {
        settle("send_quote_email", async { ack(self.post(SEND_EMAIL, quotation).await?) }.await)
    }

    /// Company lookup by tax id. The answer's `data` is passed through as is.
    pub async fn lookup_tax_id(&self, tax_id: &str) -> ApiResult<Value> {
        let result = async {
            let url = self.config.endpoint(LOOKUP_TAX_ID);
            let body = self.call(self.client.get(url).query(&[("taxId", tax_id.trim())])).await?;
            Ok::<_, ApiError>(body.get("data").cloned().unwrap_or(Value::Null))
        }
        .await;
        settle("lookup_tax_id", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_result_wire_shape() {
        let ok: ApiResult<Vec<u32>> = ApiResult::Success(vec![1]);
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({ "success": true, "data": [1] }));
        let failed: ApiResult<Vec<u32>> = ApiResult::Failure("boom".into());
        assert_eq!(serde_json::to_value(&failed).unwrap(), json!({ "success": false, "error": "boom" }));
    }

    #[test]
    fn test_data_or_default() {
        let failed: ApiResult<Vec<u32>> = ApiResult::Failure("boom".into());
        assert!(failed.data_or_default().is_empty());
    }

    #[test]
    fn test_data_list_accepts_null() {
        let items: Vec<Customer> = data_list(json!({ "success": true, "data": null })).unwrap();
        assert!(items.is_empty());
    }
}
