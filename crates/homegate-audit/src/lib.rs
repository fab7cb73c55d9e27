//! # homegate-audit
//!
//! Security event logging for the Homegate admission gate.
//!
//! Every denial the gate decides produces one flat, append-only
//! [`SecurityEvent`]; sinks deliver those events to whatever durable store
//! the host provides. Recording is fire-and-forget: an audit write failing
//! must never change an admission decision, so [`EventSink::record`] has no
//! error channel.
//!
//! - [`SecurityEvent`] — the audit record (identity fields + event metadata)
//! - [`EventKind`] — the fifteen denial/anomaly kinds the gate can log
//! - [`EventSink`] — pluggable trait for event destinations
//! - [`TracingEventSink`] — default implementation over `tracing`
//! - [`MemoryEventSink`] — bounded in-memory buffer for tests/admin views
//!
//! ## Example
//!
//! ```rust
//! use homegate_audit::{EventKind, EventSink, SecurityEvent, TracingEventSink};
//!
//! let sink = TracingEventSink::new();
//!
//! let event = SecurityEvent::builder(EventKind::HoneypotTriggered)
//!     .ip_address("203.0.113.7")
//!     .user_agent("Mozilla/5.0")
//!     .request_method("POST")
//!     .extra("honeypot_value", serde_json::json!("http://spam.example"))
//!     .build();
//!
//! if let Ok(event) = event {
//!     sink.record(&event);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod sink;

// Re-export main types
pub use error::{AuditError, Result};
pub use events::{EventKind, SecurityEvent, SecurityEventBuilder, Severity};
pub use sink::{BoxedEventSink, EventSink, MemoryEventSink, NoopEventSink, TracingEventSink};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_read_back() {
        let sink = MemoryEventSink::new();

        let Ok(event) = SecurityEvent::builder(EventKind::RateLimitViolation)
            .ip_address("203.0.113.7")
            .request_count(4)
            .tier("minute")
            .build()
        else {
            panic!("expected event to build");
        };

        sink.record(&event);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tier.as_deref(), Some("minute"));
        assert_eq!(events[0].severity(), Severity::Medium);
    }
}
