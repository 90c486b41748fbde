//! Failure taxonomy and translation into the response envelope.
//!
//! Failures can surface in two places: inside a pipeline stage (before any
//! handler runs) or inside a handler. Both go through [`translate`] via the
//! [`InterceptionPoint`] trait, so the client sees the same envelope and code
//! wherever a failure started.
//!
//! Code ranges:
//! - `1000..2000`: authentication and authorization
//! - `2000..3000`: client request problems
//! - `3000..4000`: internal faults

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error, warn};

/// Credential check failures during token issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No account with that identity.
    IdentityUnknown,
    /// Account exists, password differs.
    SecretMismatch,
    /// The directory could not answer. Not the caller's fault.
    Unavailable(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::IdentityUnknown => write!(f, "unknown identity"),
            CredentialError::SecretMismatch => write!(f, "secret mismatch"),
            CredentialError::Unavailable(detail) => {
                write!(f, "credential directory unavailable: {}", detail)
            }
        }
    }
}

/// Reasons the gate rejects a presented token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// No token parameter on the request.
    Missing,
    /// Token could not be decoded into claims.
    Malformed,
    /// Signature does not match the server key.
    BadSignature,
    /// Expiry claim is at or before now.
    Expired,
    /// Not the token currently cached for the identity.
    SupersededSession,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Missing => write!(f, "token missing"),
            TokenError::Malformed => write!(f, "token malformed"),
            TokenError::BadSignature => write!(f, "token signature invalid"),
            TokenError::Expired => write!(f, "token expired"),
            TokenError::SupersededSession => write!(f, "token superseded or session expired"),
        }
    }
}

/// Missing or unusable request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    MissingParameter(String),
    InvalidParameter { name: String, reason: String },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::MissingParameter(name) => write!(f, "missing parameter `{}`", name),
            InputError::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter `{}`: {}", name, reason)
            }
        }
    }
}

/// Every failure a request can end in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    Credential(CredentialError),
    Token(TokenError),
    Input(InputError),
    /// Authenticated, but lacking the required role.
    Forbidden,
    NotFound,
    MethodNotAllowed,
    RateLimited,
    /// Unexpected fault. The detail is logged, never sent to the client.
    Internal(String),
}

impl Failure {
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal(detail.into())
    }

    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::Input(InputError::MissingParameter(name.into()))
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Input(InputError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        })
    }

    /// Translate and render as an envelope response for `origin`.
    pub fn respond(self, origin: Origin) -> Response {
        let translation = translate(&self, origin);
        Envelope::<()>::failure(&translation).into_response()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Credential(e) => write!(f, "credential rejected: {}", e),
            Failure::Token(e) => write!(f, "token rejected: {}", e),
            Failure::Input(e) => write!(f, "bad input: {}", e),
            Failure::Forbidden => write!(f, "insufficient role"),
            Failure::NotFound => write!(f, "no route"),
            Failure::MethodNotAllowed => write!(f, "method not allowed"),
            Failure::RateLimited => write!(f, "rate limited"),
            Failure::Internal(detail) => write!(f, "internal fault: {}", detail),
        }
    }
}

impl std::error::Error for Failure {}

impl From<CredentialError> for Failure {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Unavailable(_) => Failure::internal(e.to_string()),
            e => Failure::Credential(e),
        }
    }
}

impl From<TokenError> for Failure {
    fn from(e: TokenError) -> Self {
        Failure::Token(e)
    }
}

impl From<InputError> for Failure {
    fn from(e: InputError) -> Self {
        Failure::Input(e)
    }
}

/// Extension trait for mapping unexpected errors to [`Failure::Internal`].
pub trait ResultExt<T> {
    fn internal_err(self, context: &str) -> Result<T, Failure>;
}

impl<T, E: fmt::Display> ResultExt<T> for Result<T, E> {
    fn internal_err(self, context: &str) -> Result<T, Failure> {
        self.map_err(|e| Failure::internal(format!("{}: {}", context, e)))
    }
}

/// Stable wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success,
    InvalidClientId,
    InvalidClientSecret,
    MissingAccessToken,
    InvalidAccessToken,
    ExpiredAccessToken,
    NoPermission,
    SupersededAccessToken,
    MethodNotAllowed,
    NotFound,
    LimitedQps,
    MissingRequiredParameter,
    MalformedParameter,
    ServerError,
}

impl ErrorCode {
    pub fn http_status(self) -> StatusCode {
        match self {
            ErrorCode::Success => StatusCode::OK,
            ErrorCode::InvalidClientId
            | ErrorCode::InvalidClientSecret
            | ErrorCode::MissingAccessToken
            | ErrorCode::InvalidAccessToken
            | ErrorCode::ExpiredAccessToken
            | ErrorCode::SupersededAccessToken => StatusCode::UNAUTHORIZED,
            ErrorCode::NoPermission => StatusCode::FORBIDDEN,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::LimitedQps => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::MissingRequiredParameter | ErrorCode::MalformedParameter => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            ErrorCode::Success => 0,
            ErrorCode::InvalidClientId => 1001,
            ErrorCode::InvalidClientSecret => 1002,
            ErrorCode::MissingAccessToken => 1003,
            ErrorCode::InvalidAccessToken => 1004,
            ErrorCode::ExpiredAccessToken => 1005,
            ErrorCode::NoPermission => 1006,
            ErrorCode::SupersededAccessToken => 1007,
            ErrorCode::MethodNotAllowed => 2001,
            ErrorCode::NotFound => 2002,
            ErrorCode::LimitedQps => 2102,
            ErrorCode::MissingRequiredParameter => 2201,
            ErrorCode::MalformedParameter => 2202,
            ErrorCode::ServerError => 3001,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::Success => "SUCCESS",
            ErrorCode::InvalidClientId => "Unknown Client ID",
            ErrorCode::InvalidClientSecret => "Client Authentication Failed",
            ErrorCode::MissingAccessToken => "Missing Access Token",
            ErrorCode::InvalidAccessToken => "Access Token Invalid",
            ErrorCode::ExpiredAccessToken => "Access Token Expired",
            ErrorCode::NoPermission => "No Permission To Access Data",
            ErrorCode::SupersededAccessToken => "Access Token Superseded",
            ErrorCode::MethodNotAllowed => "Http Request Method Not Supported",
            ErrorCode::NotFound => "Not Found",
            ErrorCode::LimitedQps => "Request Limit Reached",
            ErrorCode::MissingRequiredParameter => "Missing A Required Parameter",
            ErrorCode::MalformedParameter => "Parameter Format Error",
            ErrorCode::ServerError => "Server Error",
        }
    }
}

/// Where a failure was intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A middleware stage, named.
    Pipeline(&'static str),
    Handler,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Pipeline(stage) => write!(f, "pipeline:{}", stage),
            Origin::Handler => write!(f, "handler"),
        }
    }
}

/// Outcome of translating a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub code: ErrorCode,
    pub message: String,
}

/// The one mapping from failure to wire code and message. Also logs the
/// failure at the severity its kind calls for.
pub fn translate(failure: &Failure, origin: Origin) -> Translation {
    let code = match failure {
        Failure::Credential(CredentialError::IdentityUnknown) => ErrorCode::InvalidClientId,
        Failure::Credential(CredentialError::SecretMismatch) => ErrorCode::InvalidClientSecret,
        Failure::Credential(CredentialError::Unavailable(_)) | Failure::Internal(_) => {
            ErrorCode::ServerError
        }
        Failure::Token(TokenError::Missing) => ErrorCode::MissingAccessToken,
        Failure::Token(TokenError::Malformed | TokenError::BadSignature) => {
            ErrorCode::InvalidAccessToken
        }
        Failure::Token(TokenError::Expired) => ErrorCode::ExpiredAccessToken,
        Failure::Token(TokenError::SupersededSession) => ErrorCode::SupersededAccessToken,
        Failure::Forbidden => ErrorCode::NoPermission,
        Failure::NotFound => ErrorCode::NotFound,
        Failure::MethodNotAllowed => ErrorCode::MethodNotAllowed,
        Failure::RateLimited => ErrorCode::LimitedQps,
        Failure::Input(InputError::MissingParameter(_)) => ErrorCode::MissingRequiredParameter,
        Failure::Input(InputError::InvalidParameter { .. }) => ErrorCode::MalformedParameter,
    };

    let message = match failure {
        Failure::Input(e) => format!("{}: {}", code.message(), e),
        _ => code.message().to_string(),
    };

    match failure {
        Failure::Internal(detail) => {
            error!(%origin, code = code.code(), detail = %detail, "Request failed")
        }
        Failure::Credential(e @ CredentialError::Unavailable(_)) => {
            error!(%origin, code = code.code(), detail = %e, "Request failed")
        }
        Failure::Input(_) | Failure::RateLimited => {
            warn!(%origin, code = code.code(), "{}", failure)
        }
        _ => debug!(%origin, code = code.code(), "{}", failure),
    }

    Translation { code, message }
}

/// Capability shared by every place that turns failures into responses.
pub trait InterceptionPoint {
    fn origin(&self) -> Origin;

    fn reject(&self, failure: Failure) -> Response {
        failure.respond(self.origin())
    }
}

/// Interception point for failures returned by handlers and extractors.
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerBoundary;

impl InterceptionPoint for HandlerBoundary {
    fn origin(&self) -> Origin {
        Origin::Handler
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        HandlerBoundary.reject(self)
    }
}

/// Uniform response body for success and failure alike.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(result: T) -> Self {
        Self {
            status: ErrorCode::Success.http_status().as_u16(),
            code: ErrorCode::Success.code(),
            message: ErrorCode::Success.message().to_string(),
            result: Some(result),
        }
    }
}

impl Envelope<()> {
    pub fn failure(translation: &Translation) -> Self {
        Self {
            status: translation.code.http_status().as_u16(),
            code: translation.code.code(),
            message: translation.message.clone(),
            result: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Shorthand for handler results.
pub type ApiResult<T> = Result<Envelope<T>, Failure>;
