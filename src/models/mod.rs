//! Core data models for the photo gallery.
//!
//! `PhotoRecord` maps to the metadata table via `sqlx::FromRow` and
//! serializes as camelCase JSON to match the gallery wire format.

pub mod photo;
