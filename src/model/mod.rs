pub mod customer;
pub mod note_template;
pub mod quotation;
pub mod service_item;
