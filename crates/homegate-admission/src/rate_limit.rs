//! Multi-tier rate limiting with progressive penalties.
//!
//! One fixed-window counter per (tier × IP), three tiers deep. The counters
//! are deliberately fixed-window: a burst straddling a window boundary can
//! admit up to twice the nominal maximum, and that approximation is part of
//! the contract — smoothing it into a sliding window would change observable
//! behavior.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::block::BlockCache;
use crate::config::RateLimitConfig;
use crate::store::TransientStore;

/// The three rate-limiting windows, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// 60-second window.
    Minute,
    /// One-hour window.
    Hour,
    /// 24-hour window.
    Day,
}

impl Tier {
    /// All tiers, cheapest window first. The first breached tier wins.
    pub const ALL: [Self; 3] = [Self::Minute, Self::Hour, Self::Day];

    /// Returns the tier name as used in counter keys and event records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    /// Counter window for this tier.
    #[must_use]
    pub const fn window(&self) -> Duration {
        match self {
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3600),
            Self::Day => Duration::from_secs(86_400),
        }
    }

    /// Block penalty applied when this tier is breached. Proportional to
    /// the severity of the violated tier.
    #[must_use]
    pub const fn penalty(&self) -> Duration {
        match self {
            Self::Minute => Duration::from_secs(5 * 60),
            Self::Hour => Duration::from_secs(30 * 60),
            Self::Day => Duration::from_secs(86_400),
        }
    }

    /// Maximum request count for this tier under the given configuration.
    #[must_use]
    pub const fn max(&self, config: &RateLimitConfig) -> u64 {
        match self {
            Self::Minute => config.max_per_minute,
            Self::Hour => config.max_per_hour,
            Self::Day => config.max_per_day,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one rate-limiter admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateOutcome {
    /// All tiers under their maximum; counters were advanced.
    Allowed,
    /// The IP already carries a block flag; no counters were touched.
    Blocked,
    /// A tier reached its maximum; a block flag was set with the tier's
    /// penalty.
    TierExceeded {
        /// The breached tier.
        tier: Tier,
        /// Counter value at the moment of the breach.
        count: u64,
    },
}

impl RateOutcome {
    /// Returns true if the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Tiered per-IP rate limiter over the transient store.
#[derive(Clone)]
pub struct TieredRateLimiter {
    store: Arc<dyn TransientStore>,
    blocks: BlockCache,
    config: RateLimitConfig,
}

impl TieredRateLimiter {
    /// Creates a limiter over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn TransientStore>, config: RateLimitConfig) -> Self {
        let blocks = BlockCache::new(store.clone());
        Self {
            store,
            blocks,
            config,
        }
    }

    fn counter_key(tier: Tier, ip: &IpAddr) -> String {
        format!("rate:{}:{ip}", tier.as_str())
    }

    /// Runs the admission check for one request from `ip`.
    ///
    /// Tier counters are independent: a first-seen request creates all
    /// three with count 1. Increments keep the existing window expiry. The
    /// first tier at its maximum sets the block flag and ends evaluation.
    pub fn admit(&self, ip: &IpAddr) -> RateOutcome {
        if self.blocks.is_blocked(ip) {
            debug!(ip = %ip, "request from blocked IP");
            return RateOutcome::Blocked;
        }

        for tier in Tier::ALL {
            let key = Self::counter_key(tier, ip);
            match self.store.get(&key) {
                None => {
                    self.store.set(&key, 1, tier.window());
                }
                Some(count) if count < tier.max(&self.config) => {
                    self.store.increment(&key);
                }
                Some(count) => {
                    self.blocks.block(ip, tier.penalty());
                    warn!(
                        ip = %ip,
                        tier = %tier,
                        count,
                        max = tier.max(&self.config),
                        "rate limit exceeded, blocking IP"
                    );
                    return RateOutcome::TierExceeded { tier, count };
                }
            }
        }

        RateOutcome::Allowed
    }

    /// Current counter value for one tier (0 when absent/expired).
    #[must_use]
    pub fn current_count(&self, tier: Tier, ip: &IpAddr) -> u64 {
        self.store.get(&Self::counter_key(tier, ip)).unwrap_or(0)
    }

    /// Returns true while `ip` carries a block flag.
    #[must_use]
    pub fn is_blocked(&self, ip: &IpAddr) -> bool {
        self.blocks.is_blocked(ip)
    }
}

impl std::fmt::Debug for TieredRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredRateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
