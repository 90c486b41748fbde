//! Token verification stage of the request pipeline.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};

use super::paths::PublicPaths;
use super::types::Principal;
use crate::clock::Clock;
use crate::error::{Failure, InterceptionPoint, Origin, TokenError};
use crate::jwt::{Signer, SignerError};
use crate::sanitize::SanitizedParams;
use crate::session::{SessionStore, token_key};

/// Default name of the request parameter carrying the token.
pub const DEFAULT_TOKEN_PARAM: &str = "access_token";

/// Everything the gate needs to decide on a request.
///
/// Never writes to the token cache.
#[derive(Clone)]
pub struct AuthGate {
    signer: Arc<Signer>,
    tokens: SessionStore<String>,
    clock: Arc<dyn Clock>,
    public_paths: Arc<PublicPaths>,
    token_param: Arc<str>,
}

impl AuthGate {
    pub fn new(
        signer: Arc<Signer>,
        tokens: SessionStore<String>,
        clock: Arc<dyn Clock>,
        public_paths: PublicPaths,
        token_param: &str,
    ) -> Self {
        Self {
            signer,
            tokens,
            clock,
            public_paths: Arc::new(public_paths),
            token_param: Arc::from(token_param),
        }
    }

    pub fn token_param(&self) -> &str {
        &self.token_param
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.is_public(path)
    }

    /// Run the token checks against already-sanitized parameters.
    ///
    /// Order: extract, verify signature, check liveness, match the cached
    /// token for the identity. The first failing step decides the error.
    pub fn authenticate(&self, params: &SanitizedParams) -> Result<Principal, TokenError> {
        let token = params
            .get(&self.token_param)
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::Missing)?;

        let claims = self.signer.verify(token).map_err(|e| match e {
            SignerError::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        })?;
        trace!(identity = %claims.sub, "Token signature verified");

        // Expiry instant itself is already dead.
        if claims.exp <= self.clock.now_secs() {
            return Err(TokenError::Expired);
        }

        // An identity with no cache entry at all is treated the same as a
        // superseded one.
        let cached = self.tokens.get_if_present(&token_key(&claims.sub));
        if cached.as_deref() != Some(token) {
            return Err(TokenError::SupersededSession);
        }

        Ok(Principal::new(claims.sub, claims.roles, claims.exp))
    }
}

impl InterceptionPoint for AuthGate {
    fn origin(&self) -> Origin {
        Origin::Pipeline("authentication")
    }
}

/// Middleware guarding every non-public path.
///
/// On success the [`Principal`] is inserted into the request extensions for
/// handlers to pick up with [`Auth`](super::Auth).
pub async fn require_token(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if gate.is_public(&path) {
        trace!(path = %path, "Public path, skipping authentication");
        return next.run(request).await;
    }

    // Parameters come from the sanitizer; compute them here only if it did not run.
    let result = match request.extensions().get::<SanitizedParams>() {
        Some(params) => gate.authenticate(params).map_err(Failure::Token),
        None => SanitizedParams::from_query(request.uri().query())
            .and_then(|params| gate.authenticate(&params).map_err(Failure::Token)),
    };

    match result {
        Ok(principal) => {
            debug!(path = %path, identity = %principal.identity, "Authenticated");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(failure) => gate.reject(failure),
    }
}
