//! Token issuance and refresh.
//!
//! Every token minted here is also written to the token cache under the
//! identity's key. The gate only accepts the cached token, so minting a new
//! one for an identity retires the old one even though the old one still
//! verifies on its own.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::auth::{Principal, RoleSet};
use crate::clock::Clock;
use crate::credentials::CredentialStore;
use crate::error::{Failure, ResultExt};
use crate::jwt::Signer;
use crate::session::{SessionCaches, login_key, token_key};

/// How long issued tokens (and their cache entries) live.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenPolicy {
    /// 30 minutes
    Short,
    /// 30 days
    #[default]
    Long,
}

impl TokenPolicy {
    pub fn duration(self) -> Duration {
        match self {
            TokenPolicy::Short => Duration::from_secs(30 * 60),
            TokenPolicy::Long => Duration::from_secs(30 * 24 * 60 * 60),
        }
    }
}

/// Result of a successful issue or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    /// Seconds until expiry, from the moment of issue.
    pub expires_in: u64,
    /// Expiry as Unix seconds.
    pub expires_at: u64,
}

pub struct TokenService {
    signer: Arc<Signer>,
    caches: SessionCaches,
    clock: Arc<dyn Clock>,
    credentials: Arc<dyn CredentialStore>,
    lifetime: Duration,
}

impl TokenService {
    pub fn new(
        signer: Arc<Signer>,
        caches: SessionCaches,
        clock: Arc<dyn Clock>,
        credentials: Arc<dyn CredentialStore>,
        policy: TokenPolicy,
    ) -> Self {
        Self {
            signer,
            caches,
            clock,
            credentials,
            lifetime: policy.duration(),
        }
    }

    /// Check credentials and issue a token carrying the identity's roles.
    pub fn issue(&self, identity: &str, password: &str) -> Result<IssuedToken, Failure> {
        let roles = self.credentials.verify(identity, password)?;
        let issued = self.mint(identity, &roles)?;

        self.caches
            .general
            .put(login_key(identity), self.clock.now_secs().to_string());
        info!(identity, expires_at = issued.expires_at, "Token issued");

        Ok(issued)
    }

    /// Issue a fresh token for an already authenticated principal. The token
    /// the principal arrived with stops working.
    pub fn refresh(&self, principal: &Principal) -> Result<IssuedToken, Failure> {
        let issued = self.mint(&principal.identity, &principal.roles)?;
        info!(
            identity = %principal.identity,
            expires_at = issued.expires_at,
            "Token refreshed"
        );
        Ok(issued)
    }

    /// Unix seconds of the identity's last successful issue, if still cached.
    pub fn last_login(&self, identity: &str) -> Option<u64> {
        self.caches
            .general
            .get_if_present(&login_key(identity))
            .and_then(|v| v.parse().ok())
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    fn mint(&self, identity: &str, roles: &RoleSet) -> Result<IssuedToken, Failure> {
        let now = self.clock.now_secs();
        let expires_in = self.lifetime.as_secs();
        let expires_at = now + expires_in;

        let token = self
            .signer
            .sign(identity, roles, expires_at)
            .internal_err("Failed to sign token")?;

        self.caches.tokens.put(token_key(identity), token.clone());

        Ok(IssuedToken {
            access_token: token,
            expires_in,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthGate, PublicPaths, DEFAULT_TOKEN_PARAM};
    use crate::clock::ManualClock;
    use crate::credentials::{DEFAULT_USER, StaticCredentials};
    use crate::error::{CredentialError, TokenError};
    use crate::sanitize::SanitizedParams;

    const NOW: u64 = 1_700_000_000;

    struct Fixture {
        service: TokenService,
        gate: AuthGate,
        clock: Arc<ManualClock>,
    }

    fn fixture(policy: TokenPolicy) -> Fixture {
        let clock = Arc::new(ManualClock::at_secs(NOW));
        let signer = Arc::new(Signer::new(b"token-service-secret"));
        let caches = SessionCaches::new(policy.duration(), clock.clone());
        let credentials = Arc::new(StaticCredentials::from_specs(&[DEFAULT_USER]).unwrap());
        let gate = AuthGate::new(
            signer.clone(),
            caches.tokens.clone(),
            clock.clone(),
            PublicPaths::default(),
            DEFAULT_TOKEN_PARAM,
        );
        let service = TokenService::new(signer, caches, clock.clone(), credentials, policy);
        Fixture {
            service,
            gate,
            clock,
        }
    }

    fn present(gate: &AuthGate, token: &str) -> Result<Principal, TokenError> {
        let params = SanitizedParams::from_pairs(vec![(
            DEFAULT_TOKEN_PARAM.to_string(),
            token.to_string(),
        )])
        .unwrap();
        gate.authenticate(&params)
    }

    #[test]
    fn test_issue_then_verify_same_instant() {
        let f = fixture(TokenPolicy::Long);
        let issued = f.service.issue("jason", "123").unwrap();

        assert!(issued.expires_in > 0);
        assert_eq!(issued.expires_at, NOW + issued.expires_in);

        let principal = present(&f.gate, &issued.access_token).unwrap();
        assert_eq!(principal.identity, "jason");
        assert_eq!(principal.roles, RoleSet::parse("admin,user,test"));
    }

    #[test]
    fn test_issue_wrong_password() {
        let f = fixture(TokenPolicy::Long);
        assert_eq!(
            f.service.issue("jason", "wrong"),
            Err(Failure::Credential(CredentialError::SecretMismatch))
        );
    }

    #[test]
    fn test_issue_unknown_identity() {
        let f = fixture(TokenPolicy::Long);
        assert_eq!(
            f.service.issue("unknown", "123"),
            Err(Failure::Credential(CredentialError::IdentityUnknown))
        );
    }

    #[test]
    fn test_failed_issue_keeps_existing_session() {
        let f = fixture(TokenPolicy::Long);
        let issued = f.service.issue("jason", "123").unwrap();
        let _ = f.service.issue("jason", "wrong");

        assert!(present(&f.gate, &issued.access_token).is_ok());
    }

    #[test]
    fn test_policy_durations() {
        assert_eq!(TokenPolicy::Short.duration(), Duration::from_secs(1800));
        assert_eq!(
            TokenPolicy::Long.duration(),
            Duration::from_secs(30 * 86_400)
        );

        let f = fixture(TokenPolicy::Short);
        let issued = f.service.issue("jason", "123").unwrap();
        assert_eq!(issued.expires_in, 1800);
    }

    #[test]
    fn test_token_rejected_at_expiry() {
        let f = fixture(TokenPolicy::Short);
        let issued = f.service.issue("jason", "123").unwrap();

        f.clock.set_secs(issued.expires_at - 1);
        assert!(present(&f.gate, &issued.access_token).is_ok());

        f.clock.set_secs(issued.expires_at);
        assert_eq!(
            present(&f.gate, &issued.access_token),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_refresh_twice_supersedes_first_refresh() {
        let f = fixture(TokenPolicy::Long);
        let issued = f.service.issue("jason", "123").unwrap();
        let principal = present(&f.gate, &issued.access_token).unwrap();

        let first = f.service.refresh(&principal).unwrap();
        let second = f.service.refresh(&principal).unwrap();

        assert_eq!(
            present(&f.gate, &first.access_token),
            Err(TokenError::SupersededSession)
        );
        assert_eq!(
            present(&f.gate, &issued.access_token),
            Err(TokenError::SupersededSession)
        );
        assert_eq!(
            present(&f.gate, &second.access_token).unwrap().identity,
            "jason"
        );
    }

    #[test]
    fn test_refresh_keeps_roles() {
        let f = fixture(TokenPolicy::Long);
        let issued = f.service.issue("jason", "123").unwrap();
        let principal = present(&f.gate, &issued.access_token).unwrap();

        let refreshed = f.service.refresh(&principal).unwrap();
        let again = present(&f.gate, &refreshed.access_token).unwrap();
        assert_eq!(again.roles, principal.roles);
    }

    #[test]
    fn test_last_login_recorded_in_general_cache() {
        let f = fixture(TokenPolicy::Long);
        assert_eq!(f.service.last_login("jason"), None);

        f.service.issue("jason", "123").unwrap();
        assert_eq!(f.service.last_login("jason"), Some(NOW));

        // General cache is short-lived regardless of the token policy.
        f.clock.advance(Duration::from_secs(31 * 60));
        assert_eq!(f.service.last_login("jason"), None);
    }
}
