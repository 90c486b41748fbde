//! Token authentication gate with role-string authorization.
//!
//! Tokens travel as a request parameter. The gate accepts a token only if
//! its signature is valid, it has not expired, and it is the exact token
//! currently cached for its identity, so issuing a new token for an identity
//! retires the previous one.

mod extractors;
mod gate;
mod paths;
mod types;

pub use extractors::Auth;
pub use gate::{AuthGate, DEFAULT_TOKEN_PARAM, require_token};
pub use paths::{DEFAULT_PUBLIC_PATHS, PublicPaths, validate_public_path};
pub use types::{AUTHORITY_PREFIX, Principal, ROLE_DELIMITER, RoleSet};
