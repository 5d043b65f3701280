pub mod coerce;
pub mod email;
pub mod error;
pub mod logger;
pub mod quotation_api;
pub mod write_lock;
