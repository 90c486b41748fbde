pub mod api;
pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod rate_limit;
pub mod sanitize;
pub mod session;
pub mod tokens;

use api::create_api_router;
use auth::{AuthGate, DEFAULT_PUBLIC_PATHS, DEFAULT_TOKEN_PARAM, PublicPaths, require_token};
use axum::{Router, middleware, routing::get};
use cleanup::SweepTargets;
use clock::{Clock, SystemClock};
use credentials::{CredentialStore, DEFAULT_USER, StaticCredentials};
use error::{Envelope, Failure};
use jwt::Signer;
use rate_limit::{DEFAULT_ISSUE_PER_MINUTE, IssueRateLimit};
use session::SessionCaches;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokens::{TokenPolicy, TokenService};
use tokio::net::TcpListener;
use tracing::info;

pub struct ServerConfig {
    /// HMAC secret for signing tokens
    pub secret: Vec<u8>,
    /// Token lifetime profile
    pub profile: TokenPolicy,
    /// Name of the request parameter carrying the token
    pub token_param: String,
    /// Path patterns reachable without a token
    pub public_paths: Vec<String>,
    /// Accounts allowed to request tokens
    pub credentials: Arc<dyn CredentialStore>,
    /// Issuance attempts allowed per identity per minute
    pub issue_rate_per_minute: NonZeroU32,
    /// Time source for expiry and cache TTLs
    pub clock: Arc<dyn Clock>,
}

impl ServerConfig {
    /// Configuration with every setting at its default except the secret.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            profile: TokenPolicy::default(),
            token_param: DEFAULT_TOKEN_PARAM.to_string(),
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect(),
            credentials: Arc::new(
                StaticCredentials::from_specs(&[DEFAULT_USER]).unwrap_or_default(),
            ),
            issue_rate_per_minute: NonZeroU32::new(DEFAULT_ISSUE_PER_MINUTE)
                .unwrap_or(NonZeroU32::MIN),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    create_app_with_sweep_targets(config).0
}

/// Like [`create_app`], also returning the caches and limiter the router was
/// built on so the caller can sweep them.
pub fn create_app_with_sweep_targets(config: &ServerConfig) -> (Router, SweepTargets) {
    let signer = Arc::new(Signer::new(&config.secret));
    let caches = SessionCaches::new(config.profile.duration(), config.clock.clone());

    let token_service = Arc::new(TokenService::new(
        signer.clone(),
        caches.clone(),
        config.clock.clone(),
        config.credentials.clone(),
        config.profile,
    ));

    let gate = AuthGate::new(
        signer,
        caches.tokens.clone(),
        config.clock.clone(),
        PublicPaths::new(&config.public_paths),
        &config.token_param,
    );

    let issue_limit = IssueRateLimit::per_minute(config.issue_rate_per_minute);
    let api_router = create_api_router(token_service, issue_limit.clone());

    // Layers run bottom-up: sanitizer first, then the gate.
    let router = Router::new()
        .route("/", get(landing))
        .route("/index.html", get(landing))
        .nest("/api", api_router)
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(gate, require_token))
        .layer(middleware::from_fn(sanitize::sanitize_params));

    (
        router,
        SweepTargets {
            caches,
            issue_limit,
        },
    )
}

async fn landing() -> Envelope<&'static str> {
    Envelope::success("Token gateway is running. Request a token with POST /api/token.")
}

async fn not_found() -> Failure {
    Failure::NotFound
}

async fn method_not_allowed() -> Failure {
    Failure::MethodNotAllowed
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Also starts the background cache sweep.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let (app, sweep_targets) = create_app_with_sweep_targets(&config);
    cleanup::spawn_sweeper(sweep_targets);

    info!(profile = ?config.profile, "Token gateway ready");

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    Ok((handle, local_addr))
}
