//! Scheduled removal of expired cache entries and idle rate-limit keys.
//!
//! Expired entries already read as absent; the sweep only reclaims memory.

use std::time::Duration;

use tracing::{debug, info};

use crate::rate_limit::IssueRateLimit;
use crate::session::SessionCaches;

/// Interval between sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Everything the sweep prunes.
#[derive(Clone)]
pub struct SweepTargets {
    pub caches: SessionCaches,
    pub issue_limit: IssueRateLimit,
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub general: usize,
    pub tokens: usize,
    pub limiter_keys: usize,
}

/// Prune every target once.
pub fn run_sweep(targets: &SweepTargets) -> SweepReport {
    let report = SweepReport {
        general: targets.caches.general.purge_expired(),
        tokens: targets.caches.tokens.purge_expired(),
        limiter_keys: targets.issue_limit.retain_recent(),
    };

    if report != SweepReport::default() {
        info!(
            general = report.general,
            tokens = report.tokens,
            limiter_keys = report.limiter_keys,
            "Purged expired entries"
        );
    } else {
        debug!("Sweep found nothing to purge");
    }

    report
}

/// Spawn a background task that sweeps periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_sweeper(targets: SweepTargets) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            interval.tick().await;
            run_sweep(&targets);
        }
    })
}
