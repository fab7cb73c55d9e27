//! Per-IP block flags.
//!
//! A block flag is a presence record in the transient store: while it
//! exists, every request from that IP is denied before any tier counter is
//! read. It is created by the rate limiter with the breached tier's penalty
//! as TTL and destroyed by expiry alone — there is no unblock path on the
//! hot path.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::store::TransientStore;

/// TTL-bound deny-all markers, one per blocked IP.
#[derive(Clone)]
pub struct BlockCache {
    store: Arc<dyn TransientStore>,
}

impl BlockCache {
    /// Creates a block cache over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TransientStore>) -> Self {
        Self { store }
    }

    fn key(ip: &IpAddr) -> String {
        format!("blocked:{ip}")
    }

    /// Returns true while a block flag exists for `ip`.
    #[must_use]
    pub fn is_blocked(&self, ip: &IpAddr) -> bool {
        self.store.get(&Self::key(ip)).is_some()
    }

    /// Sets a block flag for `ip`, expiring after `penalty`.
    pub fn block(&self, ip: &IpAddr, penalty: Duration) {
        self.store.set(&Self::key(ip), 1, penalty);
        info!(ip = %ip, penalty_secs = penalty.as_secs(), "IP blocked");
    }
}

impl std::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ManualClock, MemoryStore};

    fn cache() -> (Arc<ManualClock>, BlockCache) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        (clock, BlockCache::new(store))
    }

    #[test]
    fn block_and_check() {
        let (_clock, cache) = cache();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();

        assert!(!cache.is_blocked(&ip));
        cache.block(&ip, Duration::from_secs(300));
        assert!(cache.is_blocked(&ip));
    }

    #[test]
    fn flag_expires_by_ttl() {
        let (clock, cache) = cache();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();

        cache.block(&ip, Duration::from_secs(300));
        clock.advance(Duration::from_secs(301));

        assert!(!cache.is_blocked(&ip));
    }

    #[test]
    fn flags_are_per_ip() {
        let (_clock, cache) = cache();
        let blocked: IpAddr = "203.0.113.7".parse().unwrap();
        let other: IpAddr = "198.51.100.2".parse().unwrap();

        cache.block(&blocked, Duration::from_secs(300));
        assert!(cache.is_blocked(&blocked));
        assert!(!cache.is_blocked(&other));
    }

    #[test]
    fn reblocking_refreshes_penalty() {
        let (clock, cache) = cache();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();

        cache.block(&ip, Duration::from_secs(300));
        clock.advance(Duration::from_secs(200));
        cache.block(&ip, Duration::from_secs(300));
        clock.advance(Duration::from_secs(200));

        assert!(cache.is_blocked(&ip));
    }
}
