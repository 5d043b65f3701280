pub mod document_store;
pub mod google_sheets;
pub mod quotation_repo;
pub mod record_repo;
pub mod repository_error;
pub mod sheet_schema;
pub mod sheet_store;
