//! Signed session token creation and verification.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::auth::RoleSet;

/// Claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (identity the token was issued to)
    pub sub: String,
    /// Roles, comma-joined on the wire
    pub roles: RoleSet,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// JWT ID, unique per issued token
    pub jti: String,
}

/// Signs and verifies tokens with one HMAC key.
///
/// Built once at start-up and shared; keys are derived from the secret a
/// single time rather than per call.
#[derive(Clone)]
pub struct Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Signer {
    /// Create a new signer with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Liveness is decided by the gate against its own clock.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Sign a token for `subject` holding `roles`, valid until `expires_at`
    /// (Unix seconds). Each call gets a fresh `jti`, so two tokens issued for
    /// the same identity within one second still differ.
    pub fn sign(
        &self,
        subject: &str,
        roles: &RoleSet,
        expires_at: u64,
    ) -> Result<String, SignerError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            roles: roles.clone(),
            exp: expires_at,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(SignerError::Encoding)
    }

    /// Check the signature and decode the claims. Expiry is not checked.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, SignerError> {
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => SignerError::InvalidSignature,
                _ => SignerError::Malformed(e.to_string()),
            })
    }
}

/// Errors that can occur during token operations.
#[derive(Debug)]
pub enum SignerError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Signature does not match the key
    InvalidSignature,
    /// Token could not be parsed into claims
    Malformed(String),
}

impl std::fmt::Display for SignerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignerError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            SignerError::InvalidSignature => write!(f, "Token signature mismatch"),
            SignerError::Malformed(detail) => write!(f, "Malformed token: {}", detail),
        }
    }
}

impl std::error::Error for SignerError {}
