mod demo;
mod tokens;

use axum::Router;
use std::sync::Arc;

use crate::rate_limit::IssueRateLimit;
use crate::tokens::TokenService;

/// State shared by every API handler.
#[derive(Clone)]
pub struct ApiState {
    pub tokens: Arc<TokenService>,
}

/// Create the API router. Mounted under `/api`.
pub fn create_api_router(tokens: Arc<TokenService>, issue_limit: IssueRateLimit) -> Router {
    let state = ApiState { tokens };

    Router::new()
        .merge(tokens::router(state.clone(), issue_limit))
        .merge(demo::router(state))
}
