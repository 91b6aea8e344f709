pub mod blob_handlers;
pub mod caller;
pub mod health_handlers;
pub mod photo_handlers;
