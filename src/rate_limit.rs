//! Rate limiting for token issuance.
//!
//! Uses a token bucket per requested identity, so password guessing against
//! one account is throttled no matter which client it comes from.

use std::{num::NonZeroU32, sync::Arc};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use tracing::warn;

use crate::error::{Failure, InterceptionPoint, Origin};
use crate::sanitize::SanitizedParams;

/// Parameter naming the identity a token is requested for.
pub const IDENTITY_PARAM: &str = "user_name";

/// Default issuance attempts allowed per identity per minute.
pub const DEFAULT_ISSUE_PER_MINUTE: u32 = 10;

/// Per-identity rate limiter.
pub type IdentityLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Throttle for the issuance endpoint.
#[derive(Clone)]
pub struct IssueRateLimit {
    limiter: Arc<IdentityLimiter>,
}

impl IssueRateLimit {
    /// Allow `per_minute` attempts per identity, all of them usable in a burst.
    pub fn per_minute(per_minute: NonZeroU32) -> Self {
        Self::with_quota(Quota::per_minute(per_minute))
    }

    pub fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }

    /// Record one attempt for `identity`.
    pub fn check(&self, identity: &str) -> Result<(), Failure> {
        self.limiter
            .check_key(&identity.to_string())
            .map_err(|_| Failure::RateLimited)
    }

    /// Drop identities whose bucket has fully refilled. Every submitted
    /// `user_name` gets a key, known or not, so this must run periodically.
    /// Returns how many keys were removed.
    pub fn retain_recent(&self) -> usize {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        before.saturating_sub(self.limiter.len())
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.limiter.len()
    }
}

impl InterceptionPoint for IssueRateLimit {
    fn origin(&self) -> Origin {
        Origin::Pipeline("rate_limit")
    }
}

/// Middleware for rate limiting token issuance.
///
/// Requests without an identity pass through; the handler rejects them for
/// the missing parameter.
pub async fn rate_limit_issue(
    State(limit): State<IssueRateLimit>,
    request: Request,
    next: Next,
) -> Response {
    let identity = request
        .extensions()
        .get::<SanitizedParams>()
        .and_then(|params| params.get(IDENTITY_PARAM))
        .filter(|identity| !identity.is_empty())
        .map(str::to_string);

    if let Some(identity) = identity
        && let Err(failure) = limit.check(&identity)
    {
        warn!(identity = %identity, "Too many token requests");
        return limit.reject(failure);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_quota_is_per_identity() {
        let limit = IssueRateLimit::per_minute(NonZeroU32::new(2).unwrap());

        assert!(limit.check("jason").is_ok());
        assert!(limit.check("jason").is_ok());
        assert_eq!(limit.check("jason"), Err(Failure::RateLimited));

        // Another identity has its own bucket.
        assert!(limit.check("alice").is_ok());
    }

    #[test]
    fn test_clones_share_buckets() {
        let limit = IssueRateLimit::per_minute(NonZeroU32::new(1).unwrap());
        let other = limit.clone();

        assert!(limit.check("jason").is_ok());
        assert!(other.check("jason").is_err());
    }

    #[test]
    fn test_retain_recent_drops_refilled_buckets() {
        let limit = IssueRateLimit::with_quota(
            Quota::with_period(Duration::from_millis(5)).unwrap(),
        );
        for i in 0..1000 {
            limit.check(&format!("nobody-{}", i)).unwrap();
        }
        assert_eq!(limit.tracked(), 1000);

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(limit.retain_recent(), 1000);
        assert_eq!(limit.tracked(), 0);
    }

    #[test]
    fn test_retain_recent_keeps_throttled_identity() {
        let limit = IssueRateLimit::per_minute(NonZeroU32::new(1).unwrap());
        limit.check("jason").unwrap();

        assert_eq!(limit.retain_recent(), 0);
        assert!(limit.check("jason").is_err());
    }
}
