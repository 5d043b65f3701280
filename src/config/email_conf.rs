use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;

/// SMTP settings used to send quotations to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Empty for relays that take no authentication
    pub smtp_username: String,
    pub smtp_password: String,
    pub use_tls: bool,
    pub use_starttls: bool,
    pub from_email: String,
    /// Display name, also printed as the issuer on quotation mails
    pub from_name: String,
    pub connection_timeout_secs: u64,
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name).ok().and_then(|v| v.parse::<bool>().ok()).unwrap_or(default)
}

impl EmailConfig {
    /// E-mail is optional: returns `Ok(None)` when SMTP_HOST is not set.
    ///
    /// Environment variables:
    /// - SMTP_HOST, SMTP_PORT (587)
    /// - SMTP_USERNAME, SMTP_PASSWORD (optional, both or neither)
    /// - SMTP_USE_TLS, SMTP_USE_STARTTLS (true)
    /// - SMTP_FROM_EMAIL (required when SMTP_HOST is set), SMTP_FROM_NAME
    /// - SMTP_CONNECTION_TIMEOUT (30)
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let smtp_host = match env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => host,
            _ => {
                warn!("SMTP_HOST not set, quotation e-mail disabled");
                return Ok(None);
            }
        };
        info!("Loading email configuration from environment variables");

        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| {
                error!("Invalid SMTP_PORT value");
                ConfigError::InvalidValue("Invalid SMTP_PORT value".to_string())
            })?;
        debug!("SMTP server: {}:{}", smtp_host, smtp_port);

        let smtp_username = env::var("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();

        let from_email = env::var("SMTP_FROM_EMAIL").map_err(|_| {
            error!("SMTP_FROM_EMAIL environment variable not found");
            ConfigError::EnvVarNotFound("SMTP_FROM_EMAIL".to_string())
        })?;

        let connection_timeout_secs = env::var("SMTP_CONNECTION_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let config = EmailConfig {
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            use_tls: env_flag("SMTP_USE_TLS", true),
            use_starttls: env_flag("SMTP_USE_STARTTLS", true),
            from_email,
            from_name: env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Quotedesk".to_string()),
            connection_timeout_secs,
        };

        config.validate()?;
        info!("Email configuration loaded successfully");
        Ok(Some(config))
    }

    pub fn from_test_env() -> Self {
        EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            smtp_username: String::new(),
            smtp_password: String::new(),
            use_tls: false,
            use_starttls: false,
            from_email: "quotes@example.com".to_string(),
            from_name: "Quotedesk Test".to_string(),
            connection_timeout_secs: 10,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smtp_host.is_empty() {
            return Err(ConfigError::ValidationError("SMTP host cannot be empty".to_string()));
        }
        if self.smtp_port == 0 {
            return Err(ConfigError::ValidationError("SMTP port cannot be 0".to_string()));
        }
        if self.smtp_username.is_empty() != self.smtp_password.is_empty() {
            error!("SMTP credentials incomplete");
            return Err(ConfigError::ValidationError(
                "SMTP username and password must be set together".to_string(),
            ));
        }
        if !self.from_email.contains('@') {
            error!("Invalid from email format");
            return Err(ConfigError::ValidationError("Invalid from email format".to_string()));
        }
        if self.connection_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("Connection timeout cannot be 0".to_string()));
        }
        Ok(())
    }

    pub fn has_credentials(&self) -> bool {
        !self.smtp_username.is_empty()
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        EmailConfig {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            use_tls: true,
            use_starttls: true,
            from_email: "noreply@example.com".to_string(),
            from_name: "Quotedesk".to_string(),
            connection_timeout_secs: 30,
        }
    }
}
