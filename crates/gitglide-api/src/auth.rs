//! Caller identity extraction.
//!
//! Authentication is performed by an identity-aware proxy in front of the
//! service; it forwards the authenticated user id in a configured header.

use crate::errors::HandlerError;
use crate::AppState;
use axum::{extract::FromRequestParts, http::request::Parts};
use gitglide_core::UserId;
use tracing::debug;

/// The authenticated user for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserId);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = HandlerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = state.config.auth.user_header.as_str();
        let value = parts
            .headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(HandlerError::Unauthorized)?;

        let user_id = UserId::new(value).map_err(|e| {
            debug!(error = %e, "Rejected malformed user identity header");
            HandlerError::Unauthorized
        })?;

        Ok(Self(user_id))
    }
}
