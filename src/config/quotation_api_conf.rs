use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error, info};

use crate::config::ConfigError;

/// Where the client facade finds the webhook endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotationApiConfig {
    /// Base URL the named endpoints hang off, e.g. `https://host/webhook`
    pub base_url: String,
}

impl QuotationApiConfig {
    /// Expected environment variables:
    /// - QUOTATION_API_BASE_URL: base of `read-quotes`, `write-quote`, ... (required)
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading quotation API configuration from environment variables");
        let base_url = env::var("QUOTATION_API_BASE_URL").map_err(|_| {
            error!("QUOTATION_API_BASE_URL environment variable not found");
            ConfigError::EnvVarNotFound("QUOTATION_API_BASE_URL".to_string())
        })?;
        debug!("Quotation API base: {}", base_url);
        let config = QuotationApiConfig { base_url };
        config.validate()?;
        Ok(config)
    }

    pub fn from_test_env() -> Self {
        QuotationApiConfig { base_url: "http://127.0.0.1:8080/webhook".to_string() }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(
                "Quotation API base URL must be an http(s) URL".to_string(),
            ));
        }
        Ok(())
    }

    /// Full URL of a named endpoint.
    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = QuotationApiConfig { base_url: "https://n8n.example.com/webhook/".to_string() };
        assert_eq!(config.endpoint("read-quotes"), "https://n8n.example.com/webhook/read-quotes");
    }

    #[test]
    fn test_validate_scheme() {
        assert!(QuotationApiConfig { base_url: "ftp://x".to_string() }.validate().is_err());
        assert!(QuotationApiConfig::from_test_env().validate().is_ok());
    }
}
