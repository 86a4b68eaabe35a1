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

//! Event Consumer
//!
//! Consumer-group member that lands transition events in the outbox. The
//! offset discipline is the heart of the at-least-once contract: an offset
//! is committed only after the outbox insert succeeded, so an uninserted
//! message is redelivered to the next session. Malformed payloads are the
//! one exception: they are committed and skipped so a poison pill cannot
//! stall the partition.
//!
//! Transient consume errors back off exponentially; a closed group ends
//! the loop.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{BusConsumer, BusMessage, ConsumerEvent};
use crate::error::ConsumeError;
use crate::models::{NewNotification, Notification};
use crate::outbox::NotificationOutbox;
use crate::telemetry::TraceContext;

/// Configuration for [`EventConsumer`].
#[derive(Debug, Clone)]
pub struct EventConsumerConfig {
    /// First backoff after a transient consume error.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for EventConsumerConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Consumer loop bridging the bus into the notification outbox.
pub struct EventConsumer {
    consumer: Box<dyn BusConsumer>,
    outbox: Arc<dyn NotificationOutbox>,
    config: EventConsumerConfig,
}

impl EventConsumer {
    pub fn new(
        consumer: Box<dyn BusConsumer>,
        outbox: Arc<dyn NotificationOutbox>,
        config: EventConsumerConfig,
    ) -> Self {
        Self {
            consumer,
            outbox,
            config,
        }
    }

    /// Consumes until `shutdown` is cancelled or the group closes.
    ///
    /// Returns `Ok(())` on cancellation and [`ConsumeError::Closed`] when
    /// the underlying group was closed out from under the loop.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), ConsumeError> {
        info!("event consumer started");
        let mut backoff = self.config.initial_backoff;

        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("event consumer stopping");
                    return Ok(());
                }
                polled = self.consumer.poll() => polled,
            };

            match polled {
                Ok(ConsumerEvent::Assigned(claims)) => {
                    backoff = self.config.initial_backoff;
                    info!(?claims, "partition assignment");
                }
                Ok(ConsumerEvent::Revoked) => {
                    info!("session cleanup complete");
                }
                Ok(ConsumerEvent::Message(message)) => {
                    backoff = self.config.initial_backoff;
                    self.handle_message(&message).await;
                }
                Err(ConsumeError::Closed) => {
                    info!("consumer group closed");
                    return Err(ConsumeError::Closed);
                }
                Err(ConsumeError::Transient { message }) => {
                    error!(%message, "transient consume failure, backing off");
                    tokio::select! {
                        _ = shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = cmp::min(backoff * 2, self.config.max_backoff);
                }
            }
        }
    }

    async fn handle_message(&mut self, message: &BusMessage) {
        debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            "message received"
        );

        if let Some(trace) = TraceContext::extract(&message.headers) {
            debug!(traceparent = %trace, "continuing trace from message headers");
        }

        let event: Notification = match serde_json::from_slice(&message.payload) {
            Ok(event) => event,
            Err(error) => {
                // poison pill: commit so the partition keeps moving
                error!(%error, offset = message.offset, "failed to decode message, skipping");
                if let Err(error) = self.consumer.commit(message).await {
                    warn!(%error, "failed to commit skipped offset");
                }
                return;
            }
        };

        match self.outbox.insert(NewNotification::from(event)).await {
            Ok(row) => {
                debug!(id = row.id, url_id = %row.url_id, "notification queued for delivery");
                if let Err(error) = self.consumer.commit(message).await {
                    warn!(%error, offset = message.offset, "failed to commit offset");
                }
            }
            Err(error) => {
                // leave the offset unmarked; the message is redelivered
                error!(%error, offset = message.offset, "outbox insert failed");
            }
        }
    }
}
