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

//! Event Producer
//!
//! Asynchronous, buffered publisher of transition events. `publish`
//! serializes the event, injects trace context into the headers, keys the
//! record by `url_id` and hands it to the bus client's input channel; it
//! never waits for the broker.
//!
//! The producer owns two drainer tasks consuming the client's success and
//! error feedback. They exit when the client closes the feedback channels,
//! which the client does after `close()` takes the input sender and the
//! flush completes. `close()` is idempotent and bounded by the flush
//! deadline; send failures are counted and logged, never retried here.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{BusRecord, ProducerChannels};
use crate::error::PublishError;
use crate::models::Notification;
use crate::telemetry::{Telemetry, TraceContext};

/// Counter: records acknowledged by the broker.
pub const EVENTS_PUBLISHED_TOTAL: &str = "notification_events_published_total";

/// Counter: records the broker gave up on.
pub const EVENTS_FAILED_TOTAL: &str = "notification_events_failed_total";

/// Configuration for [`EventProducer`].
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Topic transition events are published to.
    pub topic: String,
    /// Bound on the close-time flush and drainer join.
    pub flush_deadline: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            topic: crate::bus::DEFAULT_TOPIC.to_string(),
            flush_deadline: Duration::from_secs(5),
        }
    }
}

/// Buffered, at-least-once publisher of notification events.
pub struct EventProducer {
    topic: String,
    input: Mutex<Option<mpsc::Sender<BusRecord>>>,
    drainers: Mutex<Vec<JoinHandle<()>>>,
    flush_deadline: Duration,
    shutdown: CancellationToken,
}

impl EventProducer {
    /// Takes ownership of a bus client's channel surface and starts the
    /// success and error drainers.
    pub fn start(
        channels: ProducerChannels,
        config: ProducerConfig,
        telemetry: Arc<dyn Telemetry>,
        shutdown: CancellationToken,
    ) -> Self {
        let ProducerChannels {
            input,
            mut successes,
            mut errors,
        } = channels;

        let success_telemetry = Arc::clone(&telemetry);
        let success_drainer = tokio::spawn(async move {
            while let Some(report) = successes.recv().await {
                debug!(
                    topic = %report.topic,
                    partition = report.partition,
                    offset = report.offset,
                    key = %report.key,
                    "event delivered"
                );
                success_telemetry.increment_counter(EVENTS_PUBLISHED_TOTAL, &[]);
            }
            info!("producer success drain finished");
        });

        let error_drainer = tokio::spawn(async move {
            while let Some(failure) = errors.recv().await {
                error!(
                    topic = %failure.record.topic,
                    key = %failure.record.key,
                    message = %failure.message,
                    "event delivery failed"
                );
                telemetry.increment_counter(EVENTS_FAILED_TOTAL, &[]);
            }
            info!("producer error drain finished");
        });

        Self {
            topic: config.topic,
            input: Mutex::new(Some(input)),
            drainers: Mutex::new(vec![success_drainer, error_drainer]),
            flush_deadline: config.flush_deadline,
            shutdown,
        }
    }

    /// Enqueues one event for publication.
    ///
    /// The record is keyed by `url_id`, so all events for one URL share a
    /// partition. Blocks only on queue backpressure; returns
    /// [`PublishError::Cancelled`] if shutdown wins that wait and
    /// [`PublishError::Closed`] after [`close`](Self::close).
    pub async fn publish(&self, notification: &Notification) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(notification)?;

        let mut headers = Vec::new();
        TraceContext::generate().inject(&mut headers);

        let record = BusRecord {
            topic: self.topic.clone(),
            key: notification.url_id.clone(),
            payload,
            headers,
        };

        let sender = match &*self.input.lock() {
            Some(sender) => sender.clone(),
            None => return Err(PublishError::Closed),
        };

        tokio::select! {
            sent = sender.send(record) => match sent {
                Ok(()) => {
                    debug!(topic = %self.topic, key = %notification.url_id, "event queued");
                    Ok(())
                }
                Err(_) => Err(PublishError::Closed),
            },
            _ = self.shutdown.cancelled() => Err(PublishError::Cancelled),
        }
    }

    /// Gracefully drains the producer.
    ///
    /// Takes the input sender so no new enqueues are accepted, lets the bus
    /// client flush in-flight records, and joins both drainers within the
    /// flush deadline. Safe to call more than once; later calls are no-ops.
    pub async fn close(&self) {
        let input = self.input.lock().take();
        let handles: Vec<JoinHandle<()>> = {
            let mut drainers = self.drainers.lock();
            drainers.drain(..).collect()
        };
        if input.is_none() && handles.is_empty() {
            return;
        }
        drop(input);

        info!("closing event producer");
        let join_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if timeout(self.flush_deadline, join_all).await.is_err() {
            warn!(
                deadline_secs = self.flush_deadline.as_secs_f64(),
                "producer drain exceeded flush deadline, abandoning"
            );
            return;
        }
        info!("event producer closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::models::{DeliveryStatus, Notification};
    use crate::telemetry::RecordingTelemetry;
    use chrono::Utc;

    fn event(url_id: &str) -> Notification {
        Notification {
            url_id: url_id.to_string(),
            kind: "url_unhealthy".to_string(),
            message: "URL http://ex.test is unreachable".to_string(),
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
        }
    }

    fn producer_over(
        bus: &InMemoryBus,
        telemetry: Arc<RecordingTelemetry>,
    ) -> EventProducer {
        EventProducer::start(
            bus.producer(256),
            ProducerConfig::default(),
            telemetry,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn publishes_keyed_records_with_trace_headers() {
        let bus = InMemoryBus::new("notifications", 4);
        let telemetry = Arc::new(RecordingTelemetry::new());
        let producer = producer_over(&bus, telemetry.clone());

        producer.publish(&event("u1")).await.unwrap();
        producer.publish(&event("u1")).await.unwrap();
        producer.close().await;

        assert_eq!(bus.message_count(), 2);
        assert_eq!(telemetry.counter(EVENTS_PUBLISHED_TOTAL, &[]), 2);

        use crate::bus::{BusConsumer, ConsumerEvent};
        let mut consumer = bus.consumer("g1");
        consumer.poll().await.unwrap();
        let expected_partition = bus.partition_for("u1");
        for _ in 0..2 {
            match consumer.poll().await.unwrap() {
                ConsumerEvent::Message(message) => {
                    assert_eq!(message.key, "u1");
                    assert_eq!(message.partition, expected_partition);
                    assert!(TraceContext::extract(&message.headers).is_some());
                }
                other => panic!("expected message, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn drain_on_shutdown_resolves_all_callbacks() {
        let bus = InMemoryBus::new("notifications", 1);
        let telemetry = Arc::new(RecordingTelemetry::new());
        let producer = producer_over(&bus, telemetry.clone());

        for i in 0..100 {
            producer.publish(&event(&format!("u{i}"))).await.unwrap();
        }
        producer.close().await;

        assert_eq!(bus.message_count(), 100);
        assert_eq!(telemetry.counter(EVENTS_PUBLISHED_TOTAL, &[]), 100);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_new_publishes() {
        let bus = InMemoryBus::new("notifications", 1);
        let telemetry = Arc::new(RecordingTelemetry::new());
        let producer = producer_over(&bus, telemetry);

        producer.publish(&event("u1")).await.unwrap();
        producer.close().await;
        producer.close().await;

        let err = producer.publish(&event("u2")).await.unwrap_err();
        assert!(matches!(err, PublishError::Closed));
        assert_eq!(bus.message_count(), 1);
    }

    #[tokio::test]
    async fn failed_sends_surface_on_the_error_drain() {
        let bus = InMemoryBus::new("notifications", 1);
        bus.fail_deliveries_for("doomed");
        let telemetry = Arc::new(RecordingTelemetry::new());
        let producer = producer_over(&bus, telemetry.clone());

        producer.publish(&event("doomed")).await.unwrap();
        producer.publish(&event("fine")).await.unwrap();
        producer.close().await;

        assert_eq!(telemetry.counter(EVENTS_FAILED_TOTAL, &[]), 1);
        assert_eq!(telemetry.counter(EVENTS_PUBLISHED_TOTAL, &[]), 1);
        assert_eq!(bus.message_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_publish_returns_cancelled_under_backpressure() {
        // a bus nobody pumps: channel with capacity 1 fills immediately
        let (input, _input_rx) = mpsc::channel(1);
        let (_s_tx, successes) = mpsc::channel(1);
        let (_e_tx, errors) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let producer = EventProducer::start(
            ProducerChannels {
                input,
                successes,
                errors,
            },
            ProducerConfig {
                flush_deadline: Duration::from_millis(100),
                ..ProducerConfig::default()
            },
            Arc::new(RecordingTelemetry::new()),
            shutdown.clone(),
        );

        producer.publish(&event("u1")).await.unwrap();

        let cancel = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });
        let err = producer.publish(&event("u2")).await.unwrap_err();
        assert!(matches!(err, PublishError::Cancelled));
    }
}
