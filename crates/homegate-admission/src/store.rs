//! Expiring key-value store abstraction.
//!
//! Rate counters, block flags, and fingerprint counters all live in one
//! shared store with TTL-based expiry. The trait seam keeps the admission
//! logic independent of any specific cache backend; the in-memory
//! implementation here is the single-node default and the one the tests
//! drive with a manual clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

/// Source of monotonic time for TTL bookkeeping.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Wall clock, the production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests.
///
/// Starts at the instant of construction; [`ManualClock::advance`] moves it
/// forward so window and penalty expiry can be exercised without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    /// Creates a clock fixed at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Advances the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Expiring key-value store for counters and flags.
///
/// Semantics the admission logic relies on:
/// - `set` always (re)creates the entry with a fresh TTL.
/// - `increment` bumps an existing entry and KEEPS its expiry, so counter
///   windows are fixed, not sliding. It returns `None` for an
///   absent/expired key.
/// - expired entries are indistinguishable from absent ones.
pub trait TransientStore: Send + Sync {
    /// Returns the value at `key`, if present and unexpired.
    fn get(&self, key: &str) -> Option<u64>;

    /// Sets `key` to `value`, expiring after `ttl`.
    fn set(&self, key: &str, value: u64, ttl: Duration);

    /// Increments `key` preserving its expiry; returns the new value, or
    /// `None` if the key is absent or expired.
    fn increment(&self, key: &str) -> Option<u64>;

    /// Removes `key`.
    fn remove(&self, key: &str);
}

#[derive(Debug)]
struct Entry {
    value: u64,
    expires_at: Instant,
}

/// In-memory [`TransientStore`] with lazy eviction and an interval sweep.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    last_cleanup: RwLock<Instant>,
    cleanup_interval: Duration,
}

impl MemoryStore {
    /// Creates a store on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates a store on the given clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            last_cleanup: RwLock::new(now),
            cleanup_interval: Duration::from_secs(60),
        }
    }

    /// Number of live (unexpired) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .read()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    /// Returns true if the store holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every expired entry; returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        let removed = before.saturating_sub(entries.len());
        if removed > 0 {
            debug!(removed, "dropped expired transient entries");
        }
        *self.last_cleanup.write() = now;
        removed
    }

    fn maybe_cleanup(&self) {
        let now = self.clock.now();
        let due = {
            let last = *self.last_cleanup.read();
            now.saturating_duration_since(last) >= self.cleanup_interval
        };
        if due {
            self.cleanup();
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl TransientStore for MemoryStore {
    fn get(&self, key: &str) -> Option<u64> {
        self.maybe_cleanup();
        let now = self.clock.now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value)
    }

    fn set(&self, key: &str, value: u64, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries
            .write()
            .insert(key.to_string(), Entry { value, expires_at });
    }

    fn increment(&self, key: &str) -> Option<u64> {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let entry = entries.get_mut(key).filter(|e| e.expires_at > now)?;
        entry.value += 1;
        Some(entry.value)
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_store() -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new());
        let store = MemoryStore::with_clock(clock.clone());
        (clock, store)
    }

    // ==================== Clock Tests ====================

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now().saturating_duration_since(start), Duration::from_secs(30));
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    // ==================== Store Tests ====================

    #[test]
    fn set_and_get() {
        let (_clock, store) = manual_store();

        store.set("k", 1, Duration::from_secs(60));
        assert_eq!(store.get("k"), Some(1));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn entries_expire() {
        let (clock, store) = manual_store();

        store.set("k", 1, Duration::from_secs(60));
        clock.advance(Duration::from_secs(61));

        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn increment_preserves_expiry() {
        let (clock, store) = manual_store();

        store.set("k", 1, Duration::from_secs(60));
        clock.advance(Duration::from_secs(50));

        // Increment near the end of the window must not extend it.
        assert_eq!(store.increment("k"), Some(2));
        clock.advance(Duration::from_secs(11));

        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn increment_absent_key_is_none() {
        let (_clock, store) = manual_store();
        assert_eq!(store.increment("missing"), None);
    }

    #[test]
    fn increment_expired_key_is_none() {
        let (clock, store) = manual_store();

        store.set("k", 3, Duration::from_secs(10));
        clock.advance(Duration::from_secs(11));

        assert_eq!(store.increment("k"), None);
    }

    #[test]
    fn set_refreshes_ttl() {
        let (clock, store) = manual_store();

        store.set("k", 1, Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));
        store.set("k", 5, Duration::from_secs(10));
        clock.advance(Duration::from_secs(8));

        assert_eq!(store.get("k"), Some(5));
    }

    #[test]
    fn remove_drops_entry() {
        let (_clock, store) = manual_store();

        store.set("k", 1, Duration::from_secs(60));
        store.remove("k");
        assert_eq!(store.get("k"), None);
    }

    #[test]
    fn cleanup_drops_only_expired() {
        let (clock, store) = manual_store();

        store.set("short", 1, Duration::from_secs(10));
        store.set("long", 1, Duration::from_secs(120));
        clock.advance(Duration::from_secs(11));

        let removed = store.cleanup();
        assert_eq!(removed, 1);
        assert_eq!(store.get("long"), Some(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn len_counts_live_entries_only() {
        let (clock, store) = manual_store();
        assert!(store.is_empty());

        store.set("a", 1, Duration::from_secs(10));
        store.set("b", 1, Duration::from_secs(120));
        assert_eq!(store.len(), 2);

        clock.advance(Duration::from_secs(11));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MemoryStore>();
    }
}
