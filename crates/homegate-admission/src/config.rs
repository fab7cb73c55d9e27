//! Admission gate configuration.
//!
//! All tunables the host exposes to site operators land here as plain config
//! fields; the gate itself never reads ambient state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for CAPTCHA verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    /// Whether CAPTCHA verification runs at all.
    pub enabled: bool,
    /// Public site key, rendered into the form by the host.
    pub site_key: String,
    /// Secret key used for the server-side verification call.
    pub secret_key: String,
    /// Minimum acceptable risk score, in `[0, 1]`.
    pub score_threshold: f64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            site_key: String::new(),
            secret_key: String::new(),
            score_threshold: 0.5,
        }
    }
}

/// Per-tier maximum request counts for the rate limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per minute per IP.
    pub max_per_minute: u64,
    /// Maximum requests per hour per IP.
    pub max_per_hour: u64,
    /// Maximum requests per day per IP.
    pub max_per_day: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 3,
            max_per_hour: 10,
            max_per_day: 50,
        }
    }
}

/// Bounds for the form-timing check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Minimum elapsed time between form render and submission. Anything
    /// faster than this is not a human filling in an address.
    pub min_form_time: Duration,
    /// Maximum elapsed time before a submission counts as stale/replayed.
    pub max_form_time: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_form_time: Duration::from_secs(3),
            max_form_time: Duration::from_secs(3600),
        }
    }
}

/// Limits for the fingerprint-repetition check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Window over which identical fingerprints are counted.
    pub window: Duration,
    /// Maximum occurrences of one fingerprint within the window.
    pub max_occurrences: u64,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(300),
            max_occurrences: 3,
        }
    }
}

/// Main admission gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// CAPTCHA verification settings.
    pub captcha: CaptchaConfig,
    /// Per-tier rate-limit maxima.
    pub rate_limit: RateLimitConfig,
    /// Form-timing bounds.
    pub timing: TimingConfig,
    /// Fingerprint-repetition limits.
    pub fingerprint: FingerprintConfig,
    /// Whether the advanced layers (user-agent, browser headers,
    /// fingerprint repetition) run.
    pub advanced_protection: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            captcha: CaptchaConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timing: TimingConfig::default(),
            fingerprint: FingerprintConfig::default(),
            advanced_protection: true,
        }
    }
}

impl SecurityConfig {
    /// Creates a new builder with all defaults applied.
    #[must_use]
    pub fn builder() -> SecurityConfigBuilder {
        SecurityConfigBuilder::default()
    }
}

/// Builder for [`SecurityConfig`].
#[derive(Debug, Clone, Default)]
pub struct SecurityConfigBuilder {
    config: SecurityConfig,
}

impl SecurityConfigBuilder {
    /// Sets the CAPTCHA configuration.
    #[must_use]
    pub fn captcha(mut self, captcha: CaptchaConfig) -> Self {
        self.config.captcha = captcha;
        self
    }

    /// Sets the per-tier rate-limit maxima.
    #[must_use]
    pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.config.rate_limit = rate_limit;
        self
    }

    /// Sets the form-timing bounds.
    #[must_use]
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.config.timing = timing;
        self
    }

    /// Sets the fingerprint-repetition limits.
    #[must_use]
    pub fn fingerprint(mut self, fingerprint: FingerprintConfig) -> Self {
        self.config.fingerprint = fingerprint;
        self
    }

    /// Enables or disables the advanced protection layers.
    #[must_use]
    pub const fn advanced_protection(mut self, enabled: bool) -> Self {
        self.config.advanced_protection = enabled;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> SecurityConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SecurityConfig::default();

        assert!(!config.captcha.enabled);
        assert!(config.advanced_protection);
        assert!((config.captcha.score_threshold - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.rate_limit.max_per_minute, 3);
        assert_eq!(config.rate_limit.max_per_hour, 10);
        assert_eq!(config.rate_limit.max_per_day, 50);
        assert_eq!(config.timing.min_form_time, Duration::from_secs(3));
        assert_eq!(config.timing.max_form_time, Duration::from_secs(3600));
        assert_eq!(config.fingerprint.window, Duration::from_secs(300));
        assert_eq!(config.fingerprint.max_occurrences, 3);
    }

    #[test]
    fn builder_defaults_enable_advanced_protection() {
        let config = SecurityConfig::builder().build();
        assert!(config.advanced_protection);
    }

    #[test]
    fn builder_overrides() {
        let config = SecurityConfig::builder()
            .rate_limit(RateLimitConfig {
                max_per_minute: 100,
                ..RateLimitConfig::default()
            })
            .timing(TimingConfig {
                min_form_time: Duration::from_secs(1),
                ..TimingConfig::default()
            })
            .advanced_protection(false)
            .build();

        assert_eq!(config.rate_limit.max_per_minute, 100);
        assert_eq!(config.rate_limit.max_per_hour, 10);
        assert_eq!(config.timing.min_form_time, Duration::from_secs(1));
        assert!(!config.advanced_protection);
    }

    #[test]
    fn captcha_builder_section() {
        let config = SecurityConfig::builder()
            .captcha(CaptchaConfig {
                enabled: true,
                site_key: "site".into(),
                secret_key: "secret".into(),
                score_threshold: 0.7,
            })
            .build();

        assert!(config.captcha.enabled);
        assert!((config.captcha.score_threshold - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn config_serializes() {
        let config = SecurityConfig::builder().build();
        let json = serde_json::to_string(&config);
        assert!(json.is_ok());
    }
}
