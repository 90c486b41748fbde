//! Axum extractors for the authenticated principal.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::types::Principal;
use crate::error::{Failure, TokenError};

/// Extractor for handlers behind the gate.
///
/// Reads the [`Principal`] the gate attached. A handler mounted on a public
/// path gets no principal and is rejected as if the token were missing.
pub struct Auth(pub Principal);

impl Auth {
    /// Role-string check for handlers with a role requirement.
    pub fn require_role(&self, role: &str) -> Result<&Principal, Failure> {
        if self.0.has_role(role) {
            Ok(&self.0)
        } else {
            tracing::debug!(identity = %self.0.identity, role, "Missing required role");
            Err(Failure::Forbidden)
        }
    }
}

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = Failure;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(Auth)
            .ok_or(Failure::Token(TokenError::Missing))
    }
}
