//! Human-verification pipeline.
//!
//! Ordered, short-circuiting layers. Each layer is a pure check returning
//! `Option<Denial>`; the pipeline returns the first denial and the gate logs
//! it exactly once. CAPTCHA runs first among the enabled layers, then the
//! zero-cost honeypot and timing checks, then the advanced heuristics.
//! Configuration absence on an enabled layer (e.g. no secret key) is a
//! failure for that layer, never a skip.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use homegate_audit::EventKind;
use tracing::debug;

use crate::captcha::CaptchaVerifier;
use crate::config::{SecurityConfig, TimingConfig};
use crate::fingerprint::{FingerprintOutcome, FingerprintTracker};
use crate::identity::{ClientIdentity, LookupRequest};
use crate::store::TransientStore;

/// Automation signatures matched case-insensitively against the user agent.
const BOT_SIGNATURES: [&str; 19] = [
    "curl",
    "wget",
    "python",
    "bot",
    "spider",
    "crawler",
    "scraper",
    "postman",
    "insomnia",
    "automated",
    "phantom",
    "selenium",
    "headless",
    "puppeteer",
    "playwright",
    "requests",
    "urllib",
    "httpie",
    "apache-httpclient",
];

/// Plausible user-agent length range for real browsers, in characters.
const USER_AGENT_LENGTH_RANGE: (usize, usize) = (10, 500);

/// Headers every real browser sends with a form submission.
const REQUIRED_BROWSER_HEADERS: [&str; 2] = ["accept", "accept-language"];

/// One verification denial: the event kind plus layer-specific metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Denial {
    /// The event kind logged for this denial.
    pub kind: EventKind,
    /// Layer-specific metadata carried into the event record.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Denial {
    fn new(kind: EventKind) -> Self {
        Self {
            kind,
            extra: HashMap::new(),
        }
    }

    fn with(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Honeypot check: the `website` field is invisible to humans and must
/// arrive empty.
#[must_use]
pub fn check_honeypot(request: &LookupRequest) -> Option<Denial> {
    let honeypot = request.honeypot.as_deref().unwrap_or("");
    if honeypot.is_empty() {
        None
    } else {
        Some(
            Denial::new(EventKind::HoneypotTriggered)
                .with("honeypot_value", serde_json::json!(honeypot)),
        )
    }
}

/// Timing check against the form-render timestamp.
///
/// `now` is Unix seconds; passing it in keeps the check pure.
#[must_use]
pub fn check_timing(
    form_timestamp: Option<i64>,
    now: i64,
    config: &TimingConfig,
) -> Option<Denial> {
    let timestamp = match form_timestamp {
        Some(ts) if ts > 0 => ts,
        _ => return Some(Denial::new(EventKind::MissingTimestamp)),
    };

    let elapsed = now - timestamp;
    let min = config.min_form_time.as_secs() as i64;
    let max = config.max_form_time.as_secs() as i64;

    if elapsed < min {
        return Some(
            Denial::new(EventKind::FormSubmittedTooQuickly)
                .with("time_diff", serde_json::json!(elapsed)),
        );
    }
    if elapsed > max {
        return Some(
            Denial::new(EventKind::FormSubmittedTooLate)
                .with("time_diff", serde_json::json!(elapsed)),
        );
    }
    None
}

/// User-agent shape check: present, free of automation signatures, and of
/// plausible length.
#[must_use]
pub fn validate_user_agent(user_agent: &str) -> Option<Denial> {
    if user_agent.is_empty() {
        return Some(Denial::new(EventKind::MissingUserAgent));
    }

    let lowered = user_agent.to_ascii_lowercase();
    for pattern in BOT_SIGNATURES {
        if lowered.contains(pattern) {
            return Some(
                Denial::new(EventKind::BotUserAgent)
                    .with("user_agent", serde_json::json!(user_agent))
                    .with("pattern", serde_json::json!(pattern)),
            );
        }
    }

    let length = user_agent.chars().count();
    let (min, max) = USER_AGENT_LENGTH_RANGE;
    if length < min || length > max {
        return Some(
            Denial::new(EventKind::SuspiciousUserAgentLength)
                .with("user_agent", serde_json::json!(user_agent))
                .with("length", serde_json::json!(length)),
        );
    }

    None
}

/// Header-presence heuristic: real browsers always send Accept and
/// Accept-Language, and their Accept admits HTML.
#[must_use]
pub fn check_browser_headers(headers: &HashMap<String, String>) -> Option<Denial> {
    for name in REQUIRED_BROWSER_HEADERS {
        if headers.get(name).is_none_or(|v| v.is_empty()) {
            return Some(
                Denial::new(EventKind::MissingBrowserHeader).with("header", serde_json::json!(name)),
            );
        }
    }

    let accept = headers.get("accept").map(String::as_str).unwrap_or("");
    if !accept.contains("text/html") && !accept.contains("*/*") {
        return Some(
            Denial::new(EventKind::SuspiciousAcceptHeader)
                .with("accept", serde_json::json!(accept)),
        );
    }

    None
}

/// The ordered verification pipeline.
pub struct VerificationPipeline {
    config: SecurityConfig,
    fingerprints: FingerprintTracker,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
}

impl VerificationPipeline {
    /// Creates the pipeline over the shared store. `captcha` may be `None`
    /// when CAPTCHA is disabled; an enabled config without a verifier fails
    /// closed.
    #[must_use]
    pub fn new(
        config: SecurityConfig,
        store: Arc<dyn TransientStore>,
        captcha: Option<Arc<dyn CaptchaVerifier>>,
    ) -> Self {
        let fingerprints = FingerprintTracker::new(store, config.fingerprint.clone());
        Self {
            config,
            fingerprints,
            captcha,
        }
    }

    /// Runs every enabled layer in order; returns the first denial.
    pub async fn verify(
        &self,
        request: &LookupRequest,
        identity: &ClientIdentity,
    ) -> Option<Denial> {
        if self.config.captcha.enabled {
            if let Some(denial) = self.verify_captcha(request, identity).await {
                return Some(denial);
            }
        }

        if let Some(denial) = check_honeypot(request) {
            return Some(denial);
        }

        let now = Utc::now().timestamp();
        if let Some(denial) = check_timing(request.form_timestamp, now, &self.config.timing) {
            return Some(denial);
        }

        if self.config.advanced_protection {
            if let Some(denial) = validate_user_agent(&identity.user_agent) {
                return Some(denial);
            }
            if let Some(denial) = check_browser_headers(&identity.headers) {
                return Some(denial);
            }
            if let FingerprintOutcome::Exceeded { fingerprint, count } =
                self.fingerprints.check(identity)
            {
                return Some(
                    Denial::new(EventKind::FingerprintAbuse)
                        .with("fingerprint", serde_json::json!(fingerprint))
                        .with("count", serde_json::json!(count)),
                );
            }
        }

        debug!(ip = %identity.ip, "verification layers passed");
        None
    }

    async fn verify_captcha(
        &self,
        request: &LookupRequest,
        identity: &ClientIdentity,
    ) -> Option<Denial> {
        if self.config.captcha.secret_key.trim().is_empty() {
            return Some(
                Denial::new(EventKind::RecaptchaFailed)
                    .with("error_codes", serde_json::json!(["missing-input-secret"])),
            );
        }

        let token = request.captcha_token.as_deref().map(str::trim).unwrap_or("");
        if token.is_empty() {
            return Some(
                Denial::new(EventKind::RecaptchaFailed)
                    .with("error_codes", serde_json::json!(["missing-input-response"])),
            );
        }

        let Some(verifier) = &self.captcha else {
            return Some(
                Denial::new(EventKind::RecaptchaError)
                    .with("error", serde_json::json!("no verifier configured")),
            );
        };

        match verifier.verify(token, identity.ip).await {
            Err(err) => Some(
                Denial::new(EventKind::RecaptchaError)
                    .with("error", serde_json::json!(err.to_string())),
            ),
            Ok(assessment) if !assessment.success => Some(
                Denial::new(EventKind::RecaptchaFailed)
                    .with("error_codes", serde_json::json!(assessment.error_codes)),
            ),
            Ok(assessment) => {
                let score = assessment.score.unwrap_or(0.0);
                let threshold = self.config.captcha.score_threshold;
                if score < threshold {
                    Some(
                        Denial::new(EventKind::RecaptchaLowScore)
                            .with("score", serde_json::json!(score))
                            .with("threshold", serde_json::json!(threshold)),
                    )
                } else {
                    None
                }
            }
        }
    }
}

impl std::fmt::Debug for VerificationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationPipeline")
            .field("config", &self.config)
            .field("captcha_wired", &self.captcha.is_some())
            .finish_non_exhaustive()
    }
}
