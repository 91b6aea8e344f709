//! Caller role extraction.
//!
//! Tokens are validated upstream by the identity gateway, which forwards the
//! caller's groups in a trusted header. This extractor only parses that
//! header and resolves the [`AccessGate`] once for the request.

use crate::{
    app_state::AppState,
    errors::{AppError, GalleryError},
    services::access_gate::AccessGate,
};
use axum::{extract::FromRequestParts, http::request::Parts};

/// The resolved caller of the current request.
#[derive(Debug, Clone)]
pub struct Caller(pub AccessGate);

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(&*state.claims_header)
            .ok_or(GalleryError::Unauthorized)?
            .to_str()
            .map_err(|_| GalleryError::Unauthorized)?;

        Ok(Caller(AccessGate::resolve(parse_claims(raw), &state.admin_group)))
    }
}

/// Split a claims header into group names.
///
/// Accepts `ADMIN,USER`, `ADMIN USER`, `[ADMIN USER]` and `["ADMIN","USER"]`.
pub fn parse_claims(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|claim| claim.trim_matches('"').trim())
        .filter(|claim| !claim.is_empty())
        .map(str::to_string)
        .collect()
}
