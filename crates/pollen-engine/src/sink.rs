// crates/pollen-engine/src/sink.rs

use pollen_core::events::EventRecord;
use pollen_core::traits::EventSink;

/// Publishes every committed event to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&mut self, record: &EventRecord) {
        match serde_json::to_string(&record.event) {
            Ok(body) => tracing::info!(
                "event #{} at {}: {} {}",
                record.sequence,
                record.timestamp,
                record.event.name(),
                body
            ),
            Err(e) => tracing::warn!(
                "event #{} ({}) could not be serialized: {}",
                record.sequence,
                record.event.name(),
                e
            ),
        }
    }
}
