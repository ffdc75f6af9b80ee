//! Stage lifecycle events.
//!
//! The pipeline reports `stage.started` and one terminal event per stage
//! execution to an [`EventSink`]. The default sink writes them to `tracing`.

use parking_lot::Mutex;
use tracing::{debug, info, warn, Level};

/// Trait for sinks receiving pipeline events.
///
/// Emitting never fails; a sink that cannot deliver an event drops it.
pub trait EventSink: Send + Sync {
    /// Emits an event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The type of event (e.g., "stage.started")
    /// * `data` - Optional event data
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// A no-op event sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        let data = data.unwrap_or(serde_json::Value::Null);

        if event_type == "stage.failed" {
            warn!(event_type = %event_type, data = %data, "pipeline event");
            return;
        }

        match self.level {
            Level::DEBUG | Level::TRACE => {
                debug!(event_type = %event_type, data = %data, "pipeline event");
            }
            _ => {
                info!(event_type = %event_type, data = %data, "pipeline event");
            }
        }
    }
}

/// An event sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().clone()
    }

    /// Returns the recorded event types in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events
            .lock()
            .push((event_type.to_string(), data.unwrap_or(serde_json::Value::Null)));
    }
}
