//! CAPTCHA score verification.
//!
//! The verifier is the only network dependency on the admission path, so it
//! sits behind a trait: production wires [`RecaptchaClient`], tests wire a
//! canned verifier. A transport failure is an error here and a denial at the
//! pipeline — an unreachable verification service must not become a bypass.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AdmissionError, AdmissionResult};

/// Default verification endpoint.
pub const SITEVERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Bound on the verification round trip.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// What the scoring service said about one token.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptchaAssessment {
    /// Whether the token verified at all.
    pub success: bool,
    /// Risk score in `[0, 1]`, higher meaning more human. Absent on
    /// failures and on non-scoring CAPTCHA variants.
    pub score: Option<f64>,
    /// Service error codes, when verification failed.
    pub error_codes: Vec<String>,
}

/// Verifies client-supplied CAPTCHA tokens against a scoring service.
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Verifies one token for the given client IP.
    ///
    /// # Errors
    ///
    /// Returns an error when the service cannot be reached or its response
    /// cannot be decoded. Callers treat either as verification failure.
    async fn verify(&self, token: &str, remote_ip: IpAddr) -> AdmissionResult<CaptchaAssessment>;
}

/// Wire format of the siteverify response.
#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    success: bool,
    score: Option<f64>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

impl From<SiteverifyResponse> for CaptchaAssessment {
    fn from(response: SiteverifyResponse) -> Self {
        Self {
            success: response.success,
            score: response.score,
            error_codes: response.error_codes,
        }
    }
}

/// reCAPTCHA v3 verification client.
#[derive(Debug, Clone)]
pub struct RecaptchaClient {
    http: reqwest::Client,
    secret_key: String,
    endpoint: String,
}

impl RecaptchaClient {
    /// Creates a client for the default endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(secret_key: impl Into<String>) -> AdmissionResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            secret_key: secret_key.into(),
            endpoint: SITEVERIFY_URL.to_string(),
        })
    }

    /// Overrides the verification endpoint. Intended for tests.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl CaptchaVerifier for RecaptchaClient {
    async fn verify(&self, token: &str, remote_ip: IpAddr) -> AdmissionResult<CaptchaAssessment> {
        let remote = remote_ip.to_string();
        let params = [
            ("secret", self.secret_key.as_str()),
            ("response", token),
            ("remoteip", remote.as_str()),
        ];

        let response = self
            .http
            .post(&self.endpoint)
            .form(&params)
            .send()
            .await?
            .error_for_status()?;

        let body: SiteverifyResponse = response
            .json()
            .await
            .map_err(|e| AdmissionError::CaptchaDecode(e.to_string()))?;

        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siteverify_success_decodes() {
        let json = r#"{"success": true, "score": 0.9, "action": "home_value", "hostname": "example.com"}"#;
        let parsed: Result<SiteverifyResponse, _> = serde_json::from_str(json);

        let Ok(response) = parsed else {
            panic!("expected response to decode");
        };
        let assessment = CaptchaAssessment::from(response);
        assert!(assessment.success);
        assert_eq!(assessment.score, Some(0.9));
        assert!(assessment.error_codes.is_empty());
    }

    #[test]
    fn siteverify_failure_decodes_error_codes() {
        let json = r#"{"success": false, "error-codes": ["invalid-input-response", "timeout-or-duplicate"]}"#;
        let parsed: Result<SiteverifyResponse, _> = serde_json::from_str(json);

        let Ok(response) = parsed else {
            panic!("expected response to decode");
        };
        let assessment = CaptchaAssessment::from(response);
        assert!(!assessment.success);
        assert!(assessment.score.is_none());
        assert_eq!(
            assessment.error_codes,
            vec!["invalid-input-response", "timeout-or-duplicate"]
        );
    }

    #[test]
    fn siteverify_missing_error_codes_defaults_empty() {
        let json = r#"{"success": false}"#;
        let parsed: Result<SiteverifyResponse, _> = serde_json::from_str(json);

        let Ok(response) = parsed else {
            panic!("expected response to decode");
        };
        assert!(response.error_codes.is_empty());
    }

    #[test]
    fn client_builds_with_default_endpoint() {
        let Ok(client) = RecaptchaClient::new("secret") else {
            panic!("expected client to build");
        };
        assert_eq!(client.endpoint, SITEVERIFY_URL);

        let client = client.with_endpoint("http://127.0.0.1:9/siteverify");
        assert_eq!(client.endpoint, "http://127.0.0.1:9/siteverify");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let Ok(client) = RecaptchaClient::new("secret") else {
            panic!("expected client to build");
        };
        // Port 9 (discard) with nothing listening: connection refused.
        let client = client.with_endpoint("http://127.0.0.1:9/siteverify");

        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        let result = client.verify("token", ip).await;
        assert!(matches!(result, Err(AdmissionError::CaptchaTransport(_))));
    }
}
