//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::{DEFAULT_PUBLIC_PATHS, DEFAULT_TOKEN_PARAM, validate_public_path};
use crate::clock::SystemClock;
use crate::credentials::{DEFAULT_USER, StaticCredentials, validate_user_spec};
use crate::rate_limit::DEFAULT_ISSUE_PER_MINUTE;
use crate::tokens::TokenPolicy;
use clap::Parser;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{error, info};

const MIN_SECRET_LENGTH: usize = 32;

const SECRET_ENV: &str = "TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Tollgate",
    about = "Stateless token authentication gateway"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Token lifetime: short (30 minutes) or long (30 days)
    #[arg(long, env = "TOKEN_PROFILE", default_value = "long")]
    pub profile: TokenPolicy,

    /// Request parameter carrying the token
    #[arg(long, default_value = DEFAULT_TOKEN_PARAM)]
    pub token_param: String,

    /// Path reachable without a token (repeatable). Supports `/dir/**` and `prefix*`
    #[arg(long = "public-path", value_parser = validate_public_path,
        default_values_t = DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect::<Vec<_>>())]
    pub public_paths: Vec<String>,

    /// Account as name:password:role1,role2 (repeatable)
    #[arg(long = "user", value_parser = validate_user_spec,
        default_values_t = [DEFAULT_USER.to_string()])]
    pub users: Vec<String>,

    /// Token requests allowed per identity per minute
    #[arg(long, default_value_t = NonZeroU32::new(DEFAULT_ISSUE_PER_MINUTE).unwrap_or(NonZeroU32::MIN))]
    pub issue_rate_per_minute: NonZeroU32,

    /// Path to file containing the signing secret. Prefer using TOKEN_SECRET env var instead
    #[arg(long)]
    pub secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load the signing secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(SECRET_ENV) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(SECRET_ENV) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "Signing secret is required. Set {} environment variable (recommended) or use --secret-file",
            SECRET_ENV
        );
        return None;
    };

    check_secret(&secret).map_err(|e| error!("{}", e)).ok()?;

    Some(secret)
}

fn check_secret(secret: &str) -> Result<(), String> {
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(format!(
            "Signing secret is shorter than {} bytes. Use a longer secret",
            MIN_SECRET_LENGTH
        ));
    }
    Ok(())
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if the account list is unusable.
pub fn build_config(args: Args, secret: String) -> Option<ServerConfig> {
    let credentials = match StaticCredentials::from_specs(&args.users) {
        Ok(credentials) => credentials,
        Err(e) => {
            error!(error = %e, "Invalid user spec");
            return None;
        }
    };
    info!(users = credentials.len(), "Accounts loaded");

    Some(ServerConfig {
        secret: secret.into_bytes(),
        profile: args.profile,
        token_param: args.token_param,
        public_paths: args.public_paths,
        credentials: Arc::new(credentials),
        issue_rate_per_minute: args.issue_rate_per_minute,
        clock: Arc::new(SystemClock),
    })
}
