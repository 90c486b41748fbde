//! Token API endpoints.
//!
//! - POST `/token` - Exchange `user_name` and `password` for a token
//! - GET `/refresh-token` - Exchange the presented token for a new one

use axum::{
    Router,
    extract::State,
    middleware,
    routing::{get, post},
};

use super::ApiState;
use crate::auth::Auth;
use crate::error::{ApiResult, Envelope};
use crate::rate_limit::{IDENTITY_PARAM, IssueRateLimit, rate_limit_issue};
use crate::sanitize::Params;
use crate::tokens::IssuedToken;

const PASSWORD_PARAM: &str = "password";

pub fn router(state: ApiState, issue_limit: IssueRateLimit) -> Router {
    Router::new()
        .route(
            "/token",
            post(issue_token)
                .route_layer(middleware::from_fn_with_state(issue_limit, rate_limit_issue)),
        )
        .route("/refresh-token", get(refresh_token))
        .with_state(state)
}

/// Issue a token for valid credentials.
async fn issue_token(
    State(state): State<ApiState>,
    Params(params): Params,
) -> ApiResult<IssuedToken> {
    let identity = params.require(IDENTITY_PARAM)?;
    let password = params.require(PASSWORD_PARAM)?;

    state.tokens.issue(identity, password).map(Envelope::success)
}

/// Issue a new token for the caller. The presented token stops working.
async fn refresh_token(
    State(state): State<ApiState>,
    Auth(principal): Auth,
) -> ApiResult<IssuedToken> {
    state.tokens.refresh(&principal).map(Envelope::success)
}
