//! Durable stores behind the consistency layer.
//!
//! The blob store holds photo bytes, the metadata store holds photo records.
//! Neither shares a transaction with the other.

pub mod blob_store;
pub mod local_blob_store;
pub mod metadata_store;
pub mod sqlite_metadata_store;
pub mod url_signer;
