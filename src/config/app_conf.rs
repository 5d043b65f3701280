use std::env;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ConfigError;

/// Server and webhook settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// How long a write waits for the write lock before answering "busy"
    pub write_lock_timeout_secs: u64,
    /// Brand prefix of generated quote numbers
    pub quote_prefix: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let write_lock_timeout_secs = match env::var("WRITE_LOCK_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(format!("Invalid WRITE_LOCK_TIMEOUT_SECS value '{}'", raw))
            })?,
            Err(_) => {
                warn!("WRITE_LOCK_TIMEOUT_SECS not set, using default: 10");
                10
            }
        };

        let quote_prefix = env::var("QUOTE_PREFIX").unwrap_or_else(|_| "ZN".to_string());
        debug!(host = %host, port, write_lock_timeout_secs, quote_prefix = %quote_prefix, "App configuration");

        let config = AppConfig { host, port, write_lock_timeout_secs, quote_prefix };
        config.validate()?;
        Ok(config)
    }

    pub fn from_test_env() -> Self {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            write_lock_timeout_secs: 1,
            quote_prefix: "ZN".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.write_lock_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("Write lock timeout must be greater than 0".to_string()));
        }
        let prefix = self.quote_prefix.trim();
        if prefix.is_empty() || prefix.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError("Quote prefix must be a single non-empty word".to_string()));
        }
        Ok(())
    }

    pub fn write_lock_timeout(&self) -> Duration {
        Duration::from_secs(self.write_lock_timeout_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            write_lock_timeout_secs: 10,
            quote_prefix: "ZN".to_string(),
        }
    }
}
