pub mod app_conf;
pub mod bank_info_conf;
pub mod email_conf;
pub mod mongo_conf;
pub mod quotation_api_conf;
pub mod sheets_conf;

pub use app_conf::AppConfig;
pub use bank_info_conf::BankInfoConfig;
pub use email_conf::EmailConfig;
pub use mongo_conf::MongoConfig;
pub use quotation_api_conf::QuotationApiConfig;
pub use sheets_conf::SheetsConfig;

/// Common configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
