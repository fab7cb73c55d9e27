//! Security event types.
//!
//! Every denial decided by the admission gate (and a few anomalies that are
//! logged before the denial is returned) produces one [`SecurityEvent`]. The
//! record is flat and append-only; retention is an operational concern and no
//! code in this workspace mutates or deletes events.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuditError, Result};

/// Severity level for security events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational / expected noise (e.g. a repeat attempt from an IP that
    /// is already blocked).
    Low = 0,
    /// A heuristic miss that may still be a confused human.
    Medium = 1,
    /// A definite automation signal (honeypot, bot user agent).
    High = 2,
    /// Reserved for operational failures of a verification dependency.
    Critical = 3,
}

impl Severity {
    /// Returns the string representation of this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of security event, one per denial reason the gate can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A request arrived from an IP that already carries a block flag.
    BlockedIpAttempt,
    /// A tier counter reached its maximum and the IP was blocked.
    RateLimitViolation,
    /// The CAPTCHA verification service could not be reached.
    RecaptchaError,
    /// The CAPTCHA verification service rejected the token.
    RecaptchaFailed,
    /// The CAPTCHA score came back below the configured threshold.
    RecaptchaLowScore,
    /// The honeypot form field arrived non-empty.
    HoneypotTriggered,
    /// The form-render timestamp was missing from the submission.
    MissingTimestamp,
    /// The form was submitted faster than a human plausibly could.
    FormSubmittedTooQuickly,
    /// The form-render timestamp was stale (likely a replay).
    FormSubmittedTooLate,
    /// The request carried no user agent at all.
    MissingUserAgent,
    /// The user agent matched a known automation signature.
    BotUserAgent,
    /// The user agent length fell outside the plausible browser range.
    SuspiciousUserAgentLength,
    /// A header every real browser sends was absent.
    MissingBrowserHeader,
    /// The Accept header did not look like a browser's.
    SuspiciousAcceptHeader,
    /// The request fingerprint exceeded its repetition cap.
    FingerprintAbuse,
}

impl EventKind {
    /// Returns the wire/log representation of this event kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BlockedIpAttempt => "blocked_ip_attempt",
            Self::RateLimitViolation => "rate_limit_violation",
            Self::RecaptchaError => "recaptcha_error",
            Self::RecaptchaFailed => "recaptcha_failed",
            Self::RecaptchaLowScore => "recaptcha_low_score",
            Self::HoneypotTriggered => "honeypot_triggered",
            Self::MissingTimestamp => "missing_timestamp",
            Self::FormSubmittedTooQuickly => "form_submitted_too_quickly",
            Self::FormSubmittedTooLate => "form_submitted_too_late",
            Self::MissingUserAgent => "missing_user_agent",
            Self::BotUserAgent => "bot_user_agent",
            Self::SuspiciousUserAgentLength => "suspicious_user_agent_length",
            Self::MissingBrowserHeader => "missing_browser_header",
            Self::SuspiciousAcceptHeader => "suspicious_accept_header",
            Self::FingerprintAbuse => "fingerprint_abuse",
        }
    }

    /// Returns the severity this kind of event is recorded at.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::BlockedIpAttempt | Self::FormSubmittedTooLate => Severity::Low,
            Self::RateLimitViolation
            | Self::RecaptchaFailed
            | Self::RecaptchaLowScore
            | Self::MissingTimestamp
            | Self::FormSubmittedTooQuickly
            | Self::MissingUserAgent
            | Self::SuspiciousUserAgentLength
            | Self::MissingBrowserHeader
            | Self::SuspiciousAcceptHeader => Severity::Medium,
            Self::HoneypotTriggered | Self::BotUserAgent | Self::FingerprintAbuse => {
                Severity::High
            }
            Self::RecaptchaError => Severity::Critical,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single security event, as appended to the audit trail.
///
/// The schema is flat: the common identity fields are always present,
/// `request_count`/`tier` only apply to rate-limit events, and
/// `additional_data` carries whatever layer-specific metadata the denial
/// produced (CAPTCHA score, matched bot pattern, honeypot value, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The kind of event.
    pub event_type: EventKind,
    /// Resolved client IP address.
    pub ip_address: String,
    /// Request count at the moment of a rate-limit violation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_count: Option<u64>,
    /// The rate-limit tier that was breached, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    /// Client user agent as submitted.
    pub user_agent: String,
    /// Referer header as submitted.
    pub referer: String,
    /// HTTP method of the request.
    pub request_method: String,
    /// Event-specific metadata.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub additional_data: HashMap<String, serde_json::Value>,
}

impl SecurityEvent {
    /// Creates a new event builder.
    #[must_use]
    pub fn builder(kind: EventKind) -> SecurityEventBuilder {
        SecurityEventBuilder::new(kind)
    }

    /// Returns the severity of this event.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.event_type.severity()
    }

    /// Serializes the event to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(AuditError::from)
    }
}

/// Builder for [`SecurityEvent`].
#[derive(Debug)]
pub struct SecurityEventBuilder {
    event_type: EventKind,
    timestamp: Option<DateTime<Utc>>,
    ip_address: Option<String>,
    request_count: Option<u64>,
    tier: Option<String>,
    user_agent: String,
    referer: String,
    request_method: String,
    additional_data: HashMap<String, serde_json::Value>,
}

impl SecurityEventBuilder {
    fn new(event_type: EventKind) -> Self {
        Self {
            event_type,
            timestamp: None,
            ip_address: None,
            request_count: None,
            tier: None,
            user_agent: String::new(),
            referer: String::new(),
            request_method: String::new(),
            additional_data: HashMap::new(),
        }
    }

    /// Sets the timestamp (defaults to now).
    #[must_use]
    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Sets the resolved client IP.
    #[must_use]
    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Sets the request count at violation time.
    #[must_use]
    pub const fn request_count(mut self, count: u64) -> Self {
        self.request_count = Some(count);
        self
    }

    /// Sets the breached rate-limit tier.
    #[must_use]
    pub fn tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }

    /// Sets the client user agent.
    #[must_use]
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Sets the referer.
    #[must_use]
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn request_method(mut self, method: impl Into<String>) -> Self {
        self.request_method = method.into();
        self
    }

    /// Adds one entry of event-specific metadata.
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.additional_data.insert(key.into(), value);
        self
    }

    /// Merges a map of event-specific metadata.
    #[must_use]
    pub fn extra_map(mut self, map: HashMap<String, serde_json::Value>) -> Self {
        self.additional_data.extend(map);
        self
    }

    /// Builds the event.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::MissingField`] if the IP address was not set.
    pub fn build(self) -> Result<SecurityEvent> {
        let ip_address = self.ip_address.ok_or(AuditError::MissingField("ip_address"))?;
        Ok(SecurityEvent {
            event_id: Uuid::new_v4(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            event_type: self.event_type,
            ip_address,
            request_count: self.request_count,
            tier: self.tier,
            user_agent: self.user_agent,
            referer: self.referer,
            request_method: self.request_method,
            additional_data: self.additional_data,
        })
    }
}
