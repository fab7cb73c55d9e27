//! The admission gate.
//!
//! Composes the rate limiter and the human-verification pipeline into the
//! single ALLOW/DENY decision the request handler consumes. Rate limiting
//! runs first so an already-blocked IP never costs a CAPTCHA round trip;
//! either layer's denial is final. The gate records exactly one security
//! event per denial and returns a [`Decision`] value in every case — nothing
//! is thrown across this boundary for a normal denial, and an audit write
//! failing never changes the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use homegate_audit::{EventKind, EventSink, SecurityEvent};
use tracing::{debug, warn};

use crate::captcha::CaptchaVerifier;
use crate::config::SecurityConfig;
use crate::identity::{ClientIdentity, LookupRequest};
use crate::rate_limit::{RateOutcome, Tier, TieredRateLimiter};
use crate::store::TransientStore;
use crate::verify::VerificationPipeline;

/// User-facing message for rate-limit denials.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests. Please wait before trying again.";

/// User-facing message for verification denials.
pub const FORBIDDEN_MESSAGE: &str = "Automated requests are not allowed.";

/// The gate's answer for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed to the lookup.
    pub allow: bool,
    /// Suggested HTTP status: 200 when allowed, 429 for rate-limit
    /// denials, 403 for verification denials.
    pub http_status: u16,
    /// User-facing message. Never carries internal detail.
    pub message: String,
}

impl Decision {
    /// An allowed request.
    #[must_use]
    pub fn allowed() -> Self {
        Self {
            allow: true,
            http_status: 200,
            message: String::new(),
        }
    }

    /// A rate-limit denial.
    #[must_use]
    pub fn rate_limited() -> Self {
        Self {
            allow: false,
            http_status: 429,
            message: RATE_LIMIT_MESSAGE.to_string(),
        }
    }

    /// A human-verification denial.
    #[must_use]
    pub fn forbidden() -> Self {
        Self {
            allow: false,
            http_status: 403,
            message: FORBIDDEN_MESSAGE.to_string(),
        }
    }

    /// Returns true if the request may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        self.allow
    }
}

/// The composed admission gate.
pub struct AdmissionGate {
    limiter: TieredRateLimiter,
    pipeline: VerificationPipeline,
    events: Arc<dyn EventSink>,
}

impl AdmissionGate {
    /// Creates a gate over the shared store and event sink. `captcha` may
    /// be `None` when CAPTCHA verification is disabled in `config`.
    #[must_use]
    pub fn new(
        config: SecurityConfig,
        store: Arc<dyn TransientStore>,
        captcha: Option<Arc<dyn CaptchaVerifier>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let limiter = TieredRateLimiter::new(store.clone(), config.rate_limit.clone());
        let pipeline = VerificationPipeline::new(config, store, captcha);
        Self {
            limiter,
            pipeline,
            events,
        }
    }

    /// Decides one request.
    pub async fn admit(&self, request: &LookupRequest) -> Decision {
        let identity = ClientIdentity::from_request(request);

        match self.limiter.admit(&identity.ip) {
            RateOutcome::Blocked => {
                self.record(
                    EventKind::BlockedIpAttempt,
                    &identity,
                    None,
                    None,
                    HashMap::new(),
                );
                Decision::rate_limited()
            }
            RateOutcome::TierExceeded { tier, count } => {
                let mut extra = HashMap::new();
                extra.insert(
                    "window_seconds".to_string(),
                    serde_json::json!(tier.window().as_secs()),
                );
                self.record(
                    EventKind::RateLimitViolation,
                    &identity,
                    Some(count),
                    Some(tier),
                    extra,
                );
                Decision::rate_limited()
            }
            RateOutcome::Allowed => match self.pipeline.verify(request, &identity).await {
                Some(denial) => {
                    self.record(denial.kind, &identity, None, None, denial.extra);
                    Decision::forbidden()
                }
                None => {
                    debug!(ip = %identity.ip, "request admitted");
                    Decision::allowed()
                }
            },
        }
    }

    /// Records one security event. Failures stay inside this method: the
    /// decision has already been made and must be returned regardless.
    fn record(
        &self,
        kind: EventKind,
        identity: &ClientIdentity,
        request_count: Option<u64>,
        tier: Option<Tier>,
        extra: HashMap<String, serde_json::Value>,
    ) {
        let mut builder = SecurityEvent::builder(kind)
            .ip_address(identity.ip.to_string())
            .user_agent(identity.user_agent.clone())
            .referer(identity.referer.clone())
            .request_method(identity.method.clone())
            .extra_map(extra);

        if let Some(count) = request_count {
            builder = builder.request_count(count);
        }
        if let Some(tier) = tier {
            builder = builder.tier(tier.as_str());
        }

        match builder.build() {
            Ok(event) => self.events.record(&event),
            Err(err) => warn!(%err, kind = %kind, "failed to build security event"),
        }
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Decision Tests ====================

    #[test]
    fn decision_allowed() {
        let decision = Decision::allowed();
        assert!(decision.is_allowed());
        assert_eq!(decision.http_status, 200);
        assert!(decision.message.is_empty());
    }

    #[test]
    fn decision_rate_limited() {
        let decision = Decision::rate_limited();
        assert!(!decision.is_allowed());
        assert_eq!(decision.http_status, 429);
        assert_eq!(decision.message, RATE_LIMIT_MESSAGE);
    }

    #[test]
    fn decision_forbidden() {
        let decision = Decision::forbidden();
        assert!(!decision.is_allowed());
        assert_eq!(decision.http_status, 403);
        assert_eq!(decision.message, FORBIDDEN_MESSAGE);
    }

    #[test]
    fn denial_messages_carry_no_internal_detail() {
        for decision in [Decision::rate_limited(), Decision::forbidden()] {
            assert!(!decision.message.contains("tier"));
            assert!(!decision.message.contains("fingerprint"));
            assert!(!decision.message.contains("captcha"));
        }
    }
}
