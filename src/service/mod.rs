pub mod migration_service;
pub mod quotation_service;
pub mod webhook_service;
