//! Event sink backends.
//!
//! This module provides the [`EventSink`] trait and the default
//! implementations. Recording is fire-and-forget by contract: a sink must
//! never surface a failure to its caller, because an audit write failing is
//! not allowed to change an admission decision.

use parking_lot::Mutex;

use crate::events::{SecurityEvent, Severity};

/// Trait for security event sinks.
///
/// Implement this trait to deliver events to a durable store (database
/// table, log shipper, external service). Implementations swallow their own
/// failures; `record` has no error channel on purpose.
pub trait EventSink: Send + Sync {
    /// Records a security event.
    fn record(&self, event: &SecurityEvent);
}

/// Event sink that writes through the `tracing` infrastructure.
///
/// Events are emitted at a level derived from their severity:
/// - Low → `tracing::info!`
/// - Medium → `tracing::warn!`
/// - High, Critical → `tracing::error!`
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Creates a new tracing-backed event sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn record(&self, event: &SecurityEvent) {
        let event_id = event.event_id;
        let event_type = event.event_type;
        let severity = event.severity();
        let ip = event.ip_address.as_str();

        // Serialization failure must not escape the sink.
        let json = event.to_json().unwrap_or_else(|_| "{}".to_string());

        match severity {
            Severity::Low => {
                tracing::info!(
                    target: "homegate_audit",
                    %event_id,
                    %event_type,
                    %severity,
                    ip,
                    event_json = %json,
                    "security event"
                );
            }
            Severity::Medium => {
                tracing::warn!(
                    target: "homegate_audit",
                    %event_id,
                    %event_type,
                    %severity,
                    ip,
                    event_json = %json,
                    "security event"
                );
            }
            Severity::High | Severity::Critical => {
                tracing::error!(
                    target: "homegate_audit",
                    %event_id,
                    %event_type,
                    %severity,
                    ip,
                    event_json = %json,
                    "security event"
                );
            }
        }
    }
}

/// In-memory event sink with a bounded buffer.
///
/// Used by tests and by admin surfaces that want the most recent events
/// without a round trip to the durable store. When the buffer is full the
/// oldest event is dropped.
#[derive(Debug)]
pub struct MemoryEventSink {
    events: Mutex<Vec<SecurityEvent>>,
    capacity: usize,
}

impl MemoryEventSink {
    /// Default buffer capacity.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Creates a sink with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a sink holding at most `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Returns a snapshot of all buffered events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if no events have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Clears the buffer.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Default for MemoryEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: &SecurityEvent) {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.remove(0);
        }
        events.push(event.clone());
    }
}

/// A no-op sink for disabled auditing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl NoopEventSink {
    /// Creates a new no-op sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for NoopEventSink {
    fn record(&self, _event: &SecurityEvent) {
        // Intentionally does nothing
    }
}

/// A boxed sink for dynamic dispatch.
pub type BoxedEventSink = Box<dyn EventSink>;

impl EventSink for BoxedEventSink {
    fn record(&self, event: &SecurityEvent) {
        (**self).record(event);
    }
}
