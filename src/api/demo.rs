//! Sample protected endpoints.
//!
//! - GET `/hello` - Greeting for the caller
//! - GET `/secured` - Caller details and last login
//! - GET `/admin` - Same, but requires the `admin` role

use axum::{Router, extract::State, routing::get};
use serde::Serialize;

use super::ApiState;
use crate::auth::{Auth, Principal};
use crate::error::{ApiResult, Envelope};

const ADMIN_ROLE: &str = "admin";

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/secured", get(secured))
        .route("/admin", get(admin))
        .with_state(state)
}

#[derive(Serialize)]
struct CallerInfo {
    identity: String,
    roles: Vec<String>,
    authorities: Vec<String>,
    token_expires_at: u64,
    /// Unix seconds of the last token issue, while the general cache holds it.
    last_login: Option<u64>,
}

impl CallerInfo {
    fn new(principal: &Principal, last_login: Option<u64>) -> Self {
        Self {
            identity: principal.identity.clone(),
            roles: principal.roles.iter().map(str::to_string).collect(),
            authorities: principal.authorities.clone(),
            token_expires_at: principal.token_expires_at,
            last_login,
        }
    }
}

async fn hello(Auth(principal): Auth) -> ApiResult<String> {
    Ok(Envelope::success(format!("Hello, {}", principal.identity)))
}

async fn secured(State(state): State<ApiState>, Auth(principal): Auth) -> ApiResult<CallerInfo> {
    let last_login = state.tokens.last_login(&principal.identity);
    Ok(Envelope::success(CallerInfo::new(&principal, last_login)))
}

async fn admin(State(state): State<ApiState>, auth: Auth) -> ApiResult<CallerInfo> {
    let principal = auth.require_role(ADMIN_ROLE)?;
    let last_login = state.tokens.last_login(&principal.identity);
    Ok(Envelope::success(CallerInfo::new(principal, last_login)))
}
