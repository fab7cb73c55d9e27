//! Request fingerprinting.
//!
//! The fingerprint hashes the whole identity tuple, not just the IP, so a
//! client rotating through proxy addresses while replaying an otherwise
//! identical request shape still trips the repetition cap. Violations are
//! scoped to the tuple: they deny the request but never escalate to a
//! blanket IP block, because the tuple may be one automation stack behind a
//! NAT shared with legitimate users.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::FingerprintConfig;
use crate::identity::ClientIdentity;
use crate::store::TransientStore;

/// Proxy headers folded into the fingerprint when present.
const FINGERPRINT_PROXY_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Canonical encoding of the fingerprinted fields. Struct field order fixes
/// the JSON layout, so the digest is stable across runs.
#[derive(Serialize)]
struct FingerprintFields<'a> {
    ip: String,
    user_agent: &'a str,
    accept_language: &'a str,
    accept_encoding: &'a str,
    connection: &'a str,
    referer: &'a str,
    request_method: &'a str,
    headers: BTreeMap<&'static str, &'a str>,
}

/// Computes the SHA-256 fingerprint of a request identity, hex-encoded.
#[must_use]
pub fn request_fingerprint(identity: &ClientIdentity) -> String {
    let header = |name: &str| identity.headers.get(name).map(String::as_str).unwrap_or("");

    let mut proxy_headers = BTreeMap::new();
    for name in FINGERPRINT_PROXY_HEADERS {
        if let Some(value) = identity.headers.get(name) {
            if !value.is_empty() {
                proxy_headers.insert(name, value.as_str());
            }
        }
    }

    let fields = FingerprintFields {
        ip: identity.ip.to_string(),
        user_agent: &identity.user_agent,
        accept_language: header("accept-language"),
        accept_encoding: header("accept-encoding"),
        connection: header("connection"),
        referer: &identity.referer,
        request_method: &identity.method,
        headers: proxy_headers,
    };

    // Serializing a struct of strings cannot fail; fall back to hashing
    // nothing rather than panicking if serde_json ever disagrees.
    let canonical = serde_json::to_vec(&fields).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    hex::encode(digest)
}

/// Outcome of one fingerprint-repetition check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintOutcome {
    /// Under the cap; the counter was advanced.
    Allowed,
    /// The cap was reached within the window.
    Exceeded {
        /// The offending fingerprint.
        fingerprint: String,
        /// Counter value at the moment of the violation.
        count: u64,
    },
}

impl FingerprintOutcome {
    /// Returns true if the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Counts identical fingerprints over a fixed window.
///
/// Same create-or-increment semantics as a single rate-limiter tier, but
/// keyed by the fingerprint and never consulting or setting the IP block
/// flag.
#[derive(Clone)]
pub struct FingerprintTracker {
    store: Arc<dyn TransientStore>,
    config: FingerprintConfig,
}

impl FingerprintTracker {
    /// Creates a tracker over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TransientStore>, config: FingerprintConfig) -> Self {
        Self { store, config }
    }

    /// Checks (and counts) one request's fingerprint.
    pub fn check(&self, identity: &ClientIdentity) -> FingerprintOutcome {
        let fingerprint = request_fingerprint(identity);
        let key = format!("fingerprint:{fingerprint}");

        match self.store.get(&key) {
            None => {
                self.store.set(&key, 1, self.config.window);
                FingerprintOutcome::Allowed
            }
            Some(count) if count < self.config.max_occurrences => {
                self.store.increment(&key);
                FingerprintOutcome::Allowed
            }
            Some(count) => {
                warn!(
                    ip = %identity.ip,
                    fingerprint = %fingerprint,
                    count,
                    "fingerprint repetition cap exceeded"
                );
                FingerprintOutcome::Exceeded { fingerprint, count }
            }
        }
    }
}

impl std::fmt::Debug for FingerprintTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintTracker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ClientIdentity, LookupRequest};
    use crate::store::{ManualClock, MemoryStore};
    use std::time::Duration;

    fn identity(ua: &str, forwarded_for: &str) -> ClientIdentity {
        let request = LookupRequest::builder()
            .header("user-agent", ua)
            .header("accept-language", "en-US,en;q=0.9")
            .header("accept-encoding", "gzip, deflate, br")
            .header("x-forwarded-for", forwarded_for)
            .method("POST")
            .build();
        ClientIdentity::from_request(&request)
    }

    fn tracker() -> (Arc<ManualClock>, FingerprintTracker) {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        (clock, FingerprintTracker::new(store, FingerprintConfig::default()))
    }

    // ==================== Digest Tests ====================

    #[test]
    fn fingerprint_is_stable() {
        let identity = identity("Mozilla/5.0", "203.0.113.7");
        let first = request_fingerprint(&identity);

        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(request_fingerprint(&identity), first);
    }

    #[test]
    fn fingerprint_changes_with_user_agent() {
        let a = request_fingerprint(&identity("Mozilla/5.0", "203.0.113.7"));
        let b = request_fingerprint(&identity("Mozilla/6.0", "203.0.113.7"));
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_ip() {
        let a = request_fingerprint(&identity("Mozilla/5.0", "203.0.113.7"));
        let b = request_fingerprint(&identity("Mozilla/5.0", "203.0.113.8"));
        assert_ne!(a, b);
    }

    #[test]
    fn empty_proxy_headers_treated_as_absent() {
        let bare = LookupRequest::builder()
            .header("user-agent", "Mozilla/5.0")
            .method("POST")
            .build();
        let with_empty = LookupRequest::builder()
            .header("user-agent", "Mozilla/5.0")
            .header("x-real-ip", "")
            .method("POST")
            .build();

        let a = request_fingerprint(&ClientIdentity::from_request(&bare));
        let b = request_fingerprint(&ClientIdentity::from_request(&with_empty));
        assert_eq!(a, b);

        let with_value = LookupRequest::builder()
            .header("user-agent", "Mozilla/5.0")
            .header("x-real-ip", "203.0.113.7")
            .method("POST")
            .build();
        let c = request_fingerprint(&ClientIdentity::from_request(&with_value));
        assert_ne!(a, c);
    }

    // ==================== Tracker Tests ====================

    #[test]
    fn three_occurrences_allowed_fourth_denied() {
        let (_clock, tracker) = tracker();
        let identity = identity("Mozilla/5.0", "203.0.113.7");

        for _ in 0..3 {
            assert!(tracker.check(&identity).is_allowed());
        }

        let outcome = tracker.check(&identity);
        let FingerprintOutcome::Exceeded { count, fingerprint } = outcome else {
            panic!("expected fingerprint cap to be exceeded");
        };
        assert_eq!(count, 3);
        assert_eq!(fingerprint, request_fingerprint(&identity));
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let (clock, tracker) = tracker();
        let identity = identity("Mozilla/5.0", "203.0.113.7");

        for _ in 0..3 {
            assert!(tracker.check(&identity).is_allowed());
        }
        clock.advance(Duration::from_secs(301));

        assert!(tracker.check(&identity).is_allowed());
    }

    #[test]
    fn distinct_identities_tracked_separately() {
        let (_clock, tracker) = tracker();
        let first = identity("Mozilla/5.0", "203.0.113.7");
        let second = identity("Mozilla/5.0", "198.51.100.2");

        for _ in 0..3 {
            assert!(tracker.check(&first).is_allowed());
        }
        assert!(!tracker.check(&first).is_allowed());

        // A different IP in the tuple is a different fingerprint.
        assert!(tracker.check(&second).is_allowed());
    }

    #[test]
    fn violation_does_not_touch_block_flags() {
        let (_clock, tracker) = tracker();
        let identity = identity("Mozilla/5.0", "203.0.113.7");

        for _ in 0..4 {
            let _ = tracker.check(&identity);
        }

        // The tracker writes only fingerprint keys; a block flag for the
        // IP would live under "blocked:...".
        assert_eq!(tracker.store.get(&format!("blocked:{}", identity.ip)), None);
    }

    #[test]
    fn custom_cap_respected() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(MemoryStore::with_clock(clock));
        let tracker = FingerprintTracker::new(
            store,
            FingerprintConfig {
                window: Duration::from_secs(300),
                max_occurrences: 1,
            },
        );
        let identity = identity("Mozilla/5.0", "203.0.113.7");

        assert!(tracker.check(&identity).is_allowed());
        assert!(!tracker.check(&identity).is_allowed());
    }
}
