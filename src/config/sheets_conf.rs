use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;

/// Which tabular store backs the webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetBackend {
    /// Process memory, lost on restart.
    Memory,
    /// Google Sheets REST API.
    Google,
}

impl FromStr for SheetBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(SheetBackend::Memory),
            "google" => Ok(SheetBackend::Google),
            other => Err(ConfigError::InvalidValue(format!("Unknown SHEETS_BACKEND '{}'", other))),
        }
    }
}

/// Spreadsheet configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    pub backend: SheetBackend,
    /// Id of the workbook (the long token in its URL)
    pub spreadsheet_id: Option<String>,
    /// OAuth bearer token with the spreadsheets scope
    pub access_token: Option<String>,
    /// REST base URL
    pub api_base: String,
}

impl SheetsConfig {
    /// Load spreadsheet configuration from environment variables
    ///
    /// Expected environment variables:
    /// - SHEETS_BACKEND: `memory` or `google` (defaults to memory)
    /// - GOOGLE_SHEETS_SPREADSHEET_ID: required for the google backend
    /// - GOOGLE_SHEETS_ACCESS_TOKEN: required for the google backend
    /// - GOOGLE_SHEETS_API_BASE: defaults to https://sheets.googleapis.com/v4
    pub fn from_env() -> Result<Self, ConfigError> {
        info!("Loading sheets configuration from environment variables");

        let backend = env::var("SHEETS_BACKEND")
            .unwrap_or_else(|_| {
                warn!("SHEETS_BACKEND not set, using in-memory store");
                "memory".to_string()
            })
            .parse::<SheetBackend>()?;
        debug!("Sheets backend: {:?}", backend);

        let spreadsheet_id = env::var("GOOGLE_SHEETS_SPREADSHEET_ID").ok();
        if let Some(ref id) = spreadsheet_id {
            debug!("Spreadsheet id: {}", id);
        }

        let access_token = env::var("GOOGLE_SHEETS_ACCESS_TOKEN").ok();
        if access_token.is_some() {
            debug!("Sheets access token provided");
        }

        let api_base = env::var("GOOGLE_SHEETS_API_BASE")
            .unwrap_or_else(|_| "https://sheets.googleapis.com/v4".to_string());

        let config = SheetsConfig { backend, spreadsheet_id, access_token, api_base };
        config.validate()?;
        info!("Sheets configuration loaded successfully");
        Ok(config)
    }

    pub fn from_test_env() -> Self {
        SheetsConfig {
            backend: SheetBackend::Memory,
            spreadsheet_id: None,
            access_token: None,
            api_base: "http://127.0.0.1:9".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == SheetBackend::Google {
            if self.spreadsheet_id.as_deref().map_or(true, |s| s.trim().is_empty()) {
                error!("GOOGLE_SHEETS_SPREADSHEET_ID missing for google backend");
                return Err(ConfigError::EnvVarNotFound("GOOGLE_SHEETS_SPREADSHEET_ID".to_string()));
            }
            if self.access_token.as_deref().map_or(true, |s| s.trim().is_empty()) {
                error!("GOOGLE_SHEETS_ACCESS_TOKEN missing for google backend");
                return Err(ConfigError::EnvVarNotFound("GOOGLE_SHEETS_ACCESS_TOKEN".to_string()));
            }
        }
        if !self.api_base.starts_with("http") {
            return Err(ConfigError::ValidationError("Sheets API base must be an http(s) URL".to_string()));
        }
        Ok(())
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        SheetsConfig {
            backend: SheetBackend::Memory,
            spreadsheet_id: None,
            access_token: None,
            api_base: "https://sheets.googleapis.com/v4".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("Google".parse::<SheetBackend>().unwrap(), SheetBackend::Google);
        assert!("excel".parse::<SheetBackend>().is_err());
    }

    #[test]
    fn test_google_backend_requires_credentials() {
        let mut config = SheetsConfig::default();
        config.backend = SheetBackend::Google;
        assert!(config.validate().is_err());
        config.spreadsheet_id = Some("sheet-id".to_string());
        config.access_token = Some("token".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_is_memory() {
        assert!(SheetsConfig::default().validate().is_ok());
    }
}
