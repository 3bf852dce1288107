// crates/cairn-registry/src/sink.rs
//
// Event sinks. Delivery beyond the process (queues, webhooks) is an external
// concern; these cover logging, in-memory capture, and fan-out.

use std::sync::{Arc, Mutex};

use cairn_core::{EventSink, RegistryEvent};

/// Logs every event at `info` as a JSON payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn publish(&self, event: &RegistryEvent) {
        match serde_json::to_string(event) {
            Ok(payload) => tracing::info!(kind = event.kind(), "event {}", payload),
            Err(e) => tracing::warn!(kind = event.kind(), "event serialization failed: {}", e),
        }
    }
}

/// Discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: &RegistryEvent) {}
}

/// Keeps published events in memory, in publication order.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<RegistryEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far.
    pub fn events(&self) -> Vec<RegistryEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Event kinds, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(RegistryEvent::kind)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl EventSink for MemoryEventSink {
    fn publish(&self, event: &RegistryEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// Publishes each event to every inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn publish(&self, event: &RegistryEvent) {
        for sink in &self.sinks {
            sink.publish(event);
        }
    }
}
