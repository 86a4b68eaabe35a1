/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Transition Detection and Status Write-back
//!
//! For each completed probe the recorder persists the observed status and
//! decides whether a transition event must be emitted. Emission is
//! edge-triggered: only the transition *into* `down` (from `up` or
//! `unknown`) produces an event; re-observing `down` and recovering to `up`
//! are silent.
//!
//! The previous status comes from the scheduler's snapshot rather than a
//! second registry read; this recorder is the sole writer of `status` and
//! the scheduler keeps at most one probe in flight per URL. After a crash
//! between the status write and the event enqueue, the next sweep re-reads
//! the persisted status and re-derives the edge.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::RegistryError;
use crate::events::EventProducer;
use crate::models::{Notification, UrlRecord, UrlStatus};
use crate::registry::UrlRegistry;

/// Persists probe outcomes and emits `url_unhealthy` events on the edge
/// into `down`.
pub struct StatusRecorder {
    registry: Arc<dyn UrlRegistry>,
    producer: Arc<EventProducer>,
}

impl StatusRecorder {
    pub fn new(registry: Arc<dyn UrlRegistry>, producer: Arc<EventProducer>) -> Self {
        Self { registry, producer }
    }

    /// Records one probe outcome.
    ///
    /// `url` is the snapshot the probe was scheduled from; its `status`
    /// field is the previous persisted value used for edge detection.
    /// Registry failures are logged and deferred to the next sweep; a URL
    /// deleted mid-flight is skipped.
    pub async fn record(&self, url: &UrlRecord, observed: UrlStatus) {
        let now = Utc::now();
        match self.registry.update_status(&url.id, observed, now).await {
            Ok(()) => {
                debug!(id = %url.id, status = %observed, "URL status updated");
            }
            Err(RegistryError::NotFound { .. }) => {
                warn!(id = %url.id, "URL vanished before status write, skipping");
                return;
            }
            Err(error) => {
                error!(id = %url.id, %error, "failed to update URL status");
                return;
            }
        }

        if observed == UrlStatus::Down && url.status != UrlStatus::Down {
            info!(id = %url.id, address = %url.address, previous = %url.status, "URL became unhealthy");
            let event = Notification::url_unhealthy(url, now);
            if let Err(error) = self.producer.publish(&event).await {
                warn!(id = %url.id, %error, "transition event dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::events::{EventProducer, ProducerConfig};
    use crate::models::DeliveryStatus;
    use crate::registry::MemoryUrlRegistry;
    use crate::telemetry::NoopTelemetry;
    use tokio_util::sync::CancellationToken;

    struct Harness {
        registry: Arc<MemoryUrlRegistry>,
        recorder: StatusRecorder,
        bus: InMemoryBus,
        producer: Arc<EventProducer>,
    }

    fn harness() -> Harness {
        let registry = Arc::new(MemoryUrlRegistry::new());
        let bus = InMemoryBus::new("notifications", 1);
        let producer = Arc::new(EventProducer::start(
            bus.producer(64),
            ProducerConfig::default(),
            Arc::new(NoopTelemetry),
            CancellationToken::new(),
        ));
        let recorder = StatusRecorder::new(registry.clone(), producer.clone());
        Harness {
            registry,
            recorder,
            bus,
            producer,
        }
    }

    async fn settle(h: &Harness) {
        // close flushes the pump so message_count is stable
        h.producer.close().await;
    }

    #[tokio::test]
    async fn edge_into_down_emits_exactly_one_event() {
        let h = harness();
        let mut url = h.registry.register("t1", "http://ex.test/ok").unwrap();
        url.status = UrlStatus::Up;

        h.recorder.record(&url, UrlStatus::Down).await;
        // second observation of down with the persisted value as previous
        let stored = h.registry.get(&url.id).unwrap();
        h.recorder.record(&stored, UrlStatus::Down).await;
        settle(&h).await;

        assert_eq!(h.bus.message_count(), 1);
        assert_eq!(h.registry.get(&url.id).unwrap().status, UrlStatus::Down);
    }

    #[tokio::test]
    async fn unknown_to_down_emits() {
        let h = harness();
        let url = h.registry.register("t1", "http://ex.test/ok").unwrap();
        assert_eq!(url.status, UrlStatus::Unknown);

        h.recorder.record(&url, UrlStatus::Down).await;
        settle(&h).await;

        assert_eq!(h.bus.message_count(), 1);
    }

    #[tokio::test]
    async fn recovery_and_steady_up_are_silent() {
        let h = harness();
        let mut url = h.registry.register("t1", "http://ex.test/ok").unwrap();

        url.status = UrlStatus::Down;
        h.recorder.record(&url, UrlStatus::Up).await;
        url.status = UrlStatus::Up;
        h.recorder.record(&url, UrlStatus::Up).await;
        settle(&h).await;

        assert_eq!(h.bus.message_count(), 0);
    }

    #[tokio::test]
    async fn emitted_event_has_wire_shape() {
        let h = harness();
        let url = h.registry.register("t1", "http://ex.test/ok").unwrap();
        h.recorder.record(&url, UrlStatus::Down).await;
        settle(&h).await;

        use crate::bus::{BusConsumer, ConsumerEvent};
        let mut consumer = h.bus.consumer("g1");
        consumer.poll().await.unwrap(); // assignment
        let message = match consumer.poll().await.unwrap() {
            ConsumerEvent::Message(message) => message,
            other => panic!("expected message, got {other:?}"),
        };

        assert_eq!(message.key, url.id);
        let event: Notification = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(event.url_id, url.id);
        assert_eq!(event.kind, "url_unhealthy");
        assert_eq!(event.status, DeliveryStatus::Pending);
        assert!(message
            .headers
            .iter()
            .any(|(key, _)| key == "traceparent"));
    }

    #[tokio::test]
    async fn vanished_url_is_skipped_without_event() {
        let h = harness();
        let url = UrlRecord {
            id: "ghost".to_string(),
            tenant_id: "t1".to_string(),
            address: "http://ex.test/gone".to_string(),
            status: UrlStatus::Up,
            checked_at: None,
        };

        h.recorder.record(&url, UrlStatus::Down).await;
        settle(&h).await;

        assert_eq!(h.bus.message_count(), 0);
    }
}
