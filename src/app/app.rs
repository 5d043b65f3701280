use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::app_conf::AppConfig;
use crate::config::bank_info_conf::BankInfoConfig;
use crate::config::email_conf::EmailConfig;
use crate::config::sheets_conf::{SheetBackend, SheetsConfig};
use crate::config::ConfigError;
use crate::repository::google_sheets::GoogleSheetsStore;
use crate::repository::quotation_repo::SheetQuotationRepository;
use crate::repository::repository_error::RepositoryError;
use crate::repository::sheet_store::{InMemorySheetStore, SheetStore};
use crate::router::webhook_router::webhook_router;
use crate::service::quotation_service::QuotationServiceImpl;
use crate::service::webhook_service::WebhookServiceImpl;
use crate::util::email::{EmailError, Mailer, SmtpEmailService};
use crate::util::write_lock::WriteLock;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sheet store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("Email setup error: {0}")]
    Email(#[from] EmailError),

    #[error("Invalid listen address: {0}")]
    Address(String),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct App {
    config: AppConfig,
    router: Router,
}

impl App {
    /// Wire the server from environment variables.
    pub async fn new() -> Result<Self, AppError> {
        let config = AppConfig::from_env()?;
        let sheets_config = SheetsConfig::from_env()?;
        let bank = BankInfoConfig::from_env();

        let store: Arc<dyn SheetStore> = match sheets_config.backend {
            SheetBackend::Memory => {
                warn!("Using in-memory sheet store, data is lost on restart");
                Arc::new(InMemorySheetStore::new())
            }
            SheetBackend::Google => Arc::new(GoogleSheetsStore::new(&sheets_config)?),
        };

        let mailer = match EmailConfig::from_env()? {
            Some(email_config) => Some(Arc::new(SmtpEmailService::new(email_config)?) as Arc<dyn Mailer>),
            None => {
                warn!("SMTP_HOST not set, quotation emails are disabled");
                None
            }
        };

        Ok(Self::from_parts(config, store, bank, mailer))
    }

    /// Wire the server around an existing store and mailer.
    pub fn from_parts(
        config: AppConfig,
        store: Arc<dyn SheetStore>,
        bank: BankInfoConfig,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Self {
        let repo = Arc::new(SheetQuotationRepository::new(store.clone()));
        let quotations = Arc::new(QuotationServiceImpl::new(repo, bank, config.quote_prefix.clone(), mailer));
        let lock = WriteLock::new(config.write_lock_timeout());
        let webhook = Arc::new(WebhookServiceImpl::new(store, quotations, lock));
        let router = webhook_router(webhook);
        App { config, router }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn start(self) -> Result<(), AppError> {
        let host = self
            .config
            .host
            .parse()
            .map_err(|_| AppError::Address(self.config.host.clone()))?;
        let addr = SocketAddr::new(host, self.config.port);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Server running at http://{}", addr);
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
