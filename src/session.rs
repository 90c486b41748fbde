//! In-memory key/value store with per-entry time-to-live.
//!
//! Every entry expires `ttl` after its last write; reads never extend it.
//! Growth is unbounded and eviction is purely time based: expired entries
//! read as absent immediately and are physically removed by
//! [`SessionStore::purge_expired`], which the background sweep calls.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;

use crate::clock::Clock;

/// Key prefix for the token cache, keeping identities apart from other users
/// of a shared store.
pub const TOKEN_KEY_PREFIX: &str = "token_";

/// Key prefix for last-login records in the general cache.
pub const LOGIN_KEY_PREFIX: &str = "login_";

/// TTL of the general-purpose cache.
pub const GENERAL_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    written_at: Duration,
}

/// Sharded TTL map. Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct SessionStore<V> {
    entries: Arc<DashMap<String, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> SessionStore<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or overwrite `key`, restarting its expiry clock.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let written_at = self.clock.now();
        self.entries.insert(key.into(), Entry { value, written_at });
    }

    /// Value for `key`, unless it was never written or its TTL has elapsed.
    pub fn get_if_present(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entry = self.entries.get(key)?;
        if self.is_expired(&entry, now) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &Entry<V>, now: Duration) -> bool {
        now.saturating_sub(entry.written_at) >= self.ttl
    }
}

/// Cache key under which the live token for `identity` is kept.
pub fn token_key(identity: &str) -> String {
    format!("{}{}", TOKEN_KEY_PREFIX, identity)
}

/// Cache key for the last-login record of `identity`.
pub fn login_key(identity: &str) -> String {
    format!("{}{}", LOGIN_KEY_PREFIX, identity)
}

/// The two store instances the service runs with.
#[derive(Clone)]
pub struct SessionCaches {
    /// Short-lived general cache.
    pub general: SessionStore<String>,
    /// Identity -> live token. TTL follows the token policy.
    pub tokens: SessionStore<String>,
}

impl SessionCaches {
    pub fn new(token_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            general: SessionStore::new(GENERAL_CACHE_TTL, clock.clone()),
            tokens: SessionStore::new(token_ttl, clock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const TTL: Duration = Duration::from_secs(60);

    fn store() -> (SessionStore<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_secs(1_000));
        (SessionStore::new(TTL, clock.clone()), clock)
    }

    #[test]
    fn test_get_before_ttl_returns_value() {
        let (store, clock) = store();
        store.put("k", "v".to_string());

        clock.advance(TTL - Duration::from_millis(1));
        assert_eq!(store.get_if_present("k"), Some("v".to_string()));
    }

    #[test]
    fn test_get_at_ttl_returns_absent() {
        let (store, clock) = store();
        store.put("k", "v".to_string());

        clock.advance(TTL);
        assert_eq!(store.get_if_present("k"), None);
    }

    #[test]
    fn test_never_written_is_absent() {
        let (store, _) = store();
        assert_eq!(store.get_if_present("missing"), None);
    }

    #[test]
    fn test_put_overwrites_and_resets_clock() {
        let (store, clock) = store();
        store.put("k", "old".to_string());

        clock.advance(Duration::from_secs(50));
        store.put("k", "new".to_string());

        clock.advance(Duration::from_secs(50));
        assert_eq!(store.get_if_present("k"), Some("new".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reads_do_not_extend_ttl() {
        let (store, clock) = store();
        store.put("k", "v".to_string());

        clock.advance(Duration::from_secs(40));
        assert!(store.get_if_present("k").is_some());

        clock.advance(Duration::from_secs(20));
        assert_eq!(store.get_if_present("k"), None);
    }

    #[test]
    fn test_purge_expired_removes_only_expired() {
        let (store, clock) = store();
        store.put("old", "1".to_string());
        clock.advance(Duration::from_secs(30));
        store.put("fresh", "2".to_string());
        clock.advance(Duration::from_secs(30));

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_if_present("fresh"), Some("2".to_string()));
    }

    #[test]
    fn test_clones_share_entries() {
        let (store, _) = store();
        let other = store.clone();
        store.put("k", "v".to_string());
        assert_eq!(other.get_if_present("k"), Some("v".to_string()));
    }

    #[test]
    fn test_concurrent_writers_last_write_wins_per_key() {
        let (store, _) = store();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        store.put(format!("key-{}", i), format!("{}-{}", i, j));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for i in 0..8 {
            assert_eq!(
                store.get_if_present(&format!("key-{}", i)),
                Some(format!("{}-99", i))
            );
        }
    }

    #[test]
    fn test_cache_keys_are_prefixed() {
        assert_eq!(token_key("jason"), "token_jason");
        assert_eq!(login_key("jason"), "login_jason");
    }
}
