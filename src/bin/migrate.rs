//! Copy every record reachable through the quotation API into MongoDB.
//!
//! Needs `QUOTATION_API_BASE_URL`, `MONGO_URI` and `MONGO_DATABASE`. The
//! MongoDB deployment must support transactions (replica set or sharded).

use dotenv::dotenv;
use quotedesk_backend::config::{MongoConfig, QuotationApiConfig};
use quotedesk_backend::repository::document_store::MongoDocumentStore;
use quotedesk_backend::service::migration_service::{
    EntityKind, LogProgress, MigrationService, MigrationStage, ProgressSink,
};
use quotedesk_backend::util::logger::Logger;
use quotedesk_backend::util::quotation_api::QuotationApiClient;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

/// Echoes each stage on stdout as well as in the log.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn report(&self, stage: &MigrationStage) {
        println!("{}", stage);
        LogProgress.report(stage);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenv();
    let _logger = match Logger::new("quotedesk-migrate") {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Failed to initialise logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (api_config, mongo_config) = match (QuotationApiConfig::from_env(), MongoConfig::from_env()) {
        (Ok(api), Ok(mongo)) => (api, mongo),
        (Err(e), _) | (_, Err(e)) => {
            error!("Configuration error: {}", e);
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    ConsoleProgress.report(&MigrationStage::Connecting);
    let target = match MongoDocumentStore::new(&mongo_config).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to MongoDB: {}", e);
            eprintln!("Failed to connect to MongoDB: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = target.ping().await {
        error!("MongoDB ping failed: {}", e);
        eprintln!("MongoDB ping failed: {}", e);
        return ExitCode::FAILURE;
    }

    let source = Arc::new(QuotationApiClient::new(api_config));
    let service = MigrationService::new(source, Arc::new(target), mongo_config.batch_size);

    match service.run(&ConsoleProgress).await {
        Ok(report) => {
            for kind in EntityKind::ALL {
                let counts = report.counts(kind);
                println!(
                    "{:<15} fetched {:>5}  written {:>5}  skipped {:>5}",
                    kind.to_string(),
                    counts.fetched,
                    counts.written,
                    counts.skipped
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
