//! Gallery operations. Each is request-scoped and shares no in-process
//! state; consistency between the stores is maintained purely by the order
//! in which each operation touches them.

pub mod access_gate;
pub mod deletion_coordinator;
pub mod gallery_reader;
pub mod reconciler;
pub mod upload_pipeline;
pub mod visibility_toggle;
