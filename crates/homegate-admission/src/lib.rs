//! # homegate-admission
//!
//! Request-admission gate for the public, unauthenticated home-value lookup
//! endpoint. Every inbound lookup passes the gate before any downstream
//! valuation call is made; the gate answers with a single
//! [`Decision`](gate::Decision) — allow, or deny with a reason and a
//! suggested HTTP status.
//!
//! ## Layers
//!
//! - [`TieredRateLimiter`] — minute/hour/day fixed-window counters per IP
//!   with progressive block penalties
//! - [`BlockCache`] — TTL-bound deny-all flags, checked before any tier
//!   counter is read
//! - [`VerificationPipeline`] — CAPTCHA score, honeypot, form timing,
//!   user-agent and browser-header heuristics, fingerprint repetition
//! - [`FingerprintTracker`] — catches IP-rotating clients with an
//!   otherwise identical request shape
//! - [`AdmissionGate`] — the composition consumed by the request handler
//!
//! State lives in an expiring key-value store behind the
//! [`TransientStore`] trait; the in-memory [`MemoryStore`] is the
//! single-node default. Every denial is recorded through the
//! `homegate-audit` event sink.
//!
//! ## Example
//!
//! ```rust
//! use homegate_admission::config::{RateLimitConfig, SecurityConfig};
//! use homegate_admission::rate_limit::TieredRateLimiter;
//! use homegate_admission::store::MemoryStore;
//! use std::net::IpAddr;
//! use std::sync::Arc;
//!
//! let config = SecurityConfig::builder()
//!     .rate_limit(RateLimitConfig {
//!         max_per_minute: 5,
//!         ..RateLimitConfig::default()
//!     })
//!     .build();
//!
//! let store = Arc::new(MemoryStore::new());
//! let limiter = TieredRateLimiter::new(store, config.rate_limit.clone());
//!
//! let ip: IpAddr = "203.0.113.7".parse()?;
//! assert!(limiter.admit(&ip).is_allowed());
//! # Ok::<(), std::net::AddrParseError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod block;
pub mod captcha;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod gate;
pub mod identity;
pub mod rate_limit;
pub mod store;
pub mod verify;

// Re-export main types
pub use block::BlockCache;
pub use captcha::{CaptchaAssessment, CaptchaVerifier, RecaptchaClient};
pub use config::{
    CaptchaConfig, FingerprintConfig, RateLimitConfig, SecurityConfig, SecurityConfigBuilder,
    TimingConfig,
};
pub use error::{AdmissionError, AdmissionResult};
pub use fingerprint::{FingerprintOutcome, FingerprintTracker};
pub use gate::{AdmissionGate, Decision};
pub use identity::{ClientIdentity, LookupRequest, resolve_client_ip};
pub use rate_limit::{RateOutcome, Tier, TieredRateLimiter};
pub use store::{Clock, ManualClock, MemoryStore, SystemClock, TransientStore};
pub use verify::VerificationPipeline;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::SecurityConfig;
    pub use crate::gate::{AdmissionGate, Decision};
    pub use crate::identity::LookupRequest;
    pub use crate::store::{MemoryStore, TransientStore};
}
