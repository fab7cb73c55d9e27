//! Error types for the admission gate.
//!
//! Denials are not errors: the gate expresses every deny as a
//! [`Decision`](crate::gate::Decision) value. The variants here cover the
//! genuine faults — the CAPTCHA round trip failing and invalid
//! configuration — and the verification pipeline maps them into fail-closed
//! denials rather than letting them escape the gate boundary.

use thiserror::Error;

/// Errors that can occur inside the admission gate.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The CAPTCHA verification service could not be reached or answered
    /// with a transport-level failure.
    #[error("captcha verification transport failure: {0}")]
    CaptchaTransport(#[from] reqwest::Error),

    /// The CAPTCHA verification service answered with a body that could not
    /// be decoded.
    #[error("captcha response could not be decoded: {0}")]
    CaptchaDecode(String),

    /// Configuration error.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;
