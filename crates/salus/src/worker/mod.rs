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

//! Outbox Worker
//!
//! Level-triggered drain of the notification outbox. Every tick claims the
//! pending rows and dispatches them through the delivery router under a
//! bounded concurrency budget; the tick completes only when the whole batch
//! has settled.
//!
//! Status transitions are the worker's alone: `pending -> sent` on
//! successful delivery, `pending -> failed` on delivery failure or timeout.
//! A failed status write after a successful delivery leaves the row
//! `pending`; the next tick retries it, which may duplicate the delivery —
//! the at-least-once contract tolerates that.

pub mod delivery;

pub use delivery::{Delivery, DeliveryRouter, DeliveryRouterBuilder, LogDelivery};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{DeliveryError, OutboxError};
use crate::models::{DeliveryStatus, NotificationRecord};
use crate::outbox::NotificationOutbox;

/// Configuration for [`OutboxWorker`].
#[derive(Debug, Clone)]
pub struct OutboxWorkerConfig {
    /// Drain period.
    pub outbox_period: Duration,
    /// Maximum concurrent dispatches within a tick.
    pub outbox_concurrency: usize,
    /// Per-dispatch deadline enforced around the delivery adapter.
    pub dispatch_timeout: Duration,
}

impl Default for OutboxWorkerConfig {
    fn default() -> Self {
        Self {
            outbox_period: Duration::from_secs(30),
            outbox_concurrency: 10,
            dispatch_timeout: Duration::from_secs(30),
        }
    }
}

/// Periodic drain of pending notifications toward delivery.
pub struct OutboxWorker {
    outbox: Arc<dyn NotificationOutbox>,
    router: Arc<DeliveryRouter>,
    config: OutboxWorkerConfig,
}

impl OutboxWorker {
    pub fn new(
        outbox: Arc<dyn NotificationOutbox>,
        router: Arc<DeliveryRouter>,
        config: OutboxWorkerConfig,
    ) -> Self {
        Self {
            outbox,
            router,
            config,
        }
    }

    /// Drains the outbox until `shutdown` is cancelled. A batch in progress
    /// finishes before the loop exits.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            period_secs = self.config.outbox_period.as_secs_f64(),
            concurrency = self.config.outbox_concurrency,
            "outbox worker started"
        );

        let mut interval = time::interval(self.config.outbox_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(error) = self.drain_once().await {
                        error!(%error, "failed to process notification batch");
                    }
                }
            }
        }
        info!("outbox worker stopped");
    }

    /// Processes one batch: fetch pending rows, dispatch them concurrently
    /// under the semaphore, and wait for every dispatch to settle.
    ///
    /// Returns the number of rows dispatched.
    pub async fn drain_once(&self) -> Result<usize, OutboxError> {
        let pending = self.outbox.get_pending().await?;
        if pending.is_empty() {
            debug!("no pending notifications to process");
            return Ok(0);
        }

        info!(count = pending.len(), "processing pending notifications");
        let semaphore = Arc::new(Semaphore::new(self.config.outbox_concurrency));
        let mut batch = JoinSet::new();

        let count = pending.len();
        for row in pending {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let outbox = Arc::clone(&self.outbox);
            let router = Arc::clone(&self.router);
            let dispatch_timeout = self.config.dispatch_timeout;
            batch.spawn(async move {
                let _permit = permit;
                dispatch(outbox, router, dispatch_timeout, row).await;
            });
        }

        // the tick completes only when the whole batch has settled
        while let Some(joined) = batch.join_next().await {
            if let Err(error) = joined {
                error!(%error, "dispatch task failed");
            }
        }
        Ok(count)
    }
}

/// Delivers one row and records its terminal status.
async fn dispatch(
    outbox: Arc<dyn NotificationOutbox>,
    router: Arc<DeliveryRouter>,
    dispatch_timeout: Duration,
    row: NotificationRecord,
) {
    let started = time::Instant::now();
    let outcome = match timeout(dispatch_timeout, router.deliver(&row)).await {
        Ok(Ok(())) => {
            debug!(
                id = row.id,
                url_id = %row.url_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "notification delivered"
            );
            DeliveryStatus::Sent
        }
        Ok(Err(error)) => {
            error!(id = row.id, url_id = %row.url_id, %error, "notification delivery failed");
            DeliveryStatus::Failed
        }
        Err(_) => {
            let error = DeliveryError::Timeout {
                timeout: dispatch_timeout,
            };
            error!(id = row.id, url_id = %row.url_id, %error, "notification delivery failed");
            DeliveryStatus::Failed
        }
    };

    if let Err(error) = outbox.update_status(row.id, outcome).await {
        // the row stays pending and is retried next tick; a duplicate
        // delivery is possible and tolerated
        error!(id = row.id, %error, "failed to record delivery outcome");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeliveryError;
    use crate::models::NewNotification;
    use crate::outbox::MemoryOutbox;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn notification(url_id: &str, kind: &str) -> NewNotification {
        NewNotification {
            url_id: url_id.to_string(),
            kind: kind.to_string(),
            message: "URL is unreachable".to_string(),
        }
    }

    struct CountingDelivery {
        calls: AtomicUsize,
        current: AtomicUsize,
        peak: AtomicUsize,
        latency: Duration,
        fail: bool,
    }

    impl CountingDelivery {
        fn ok(latency: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                latency,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok(Duration::ZERO)
            }
        }
    }

    #[async_trait]
    impl Delivery for CountingDelivery {
        async fn deliver(&self, _notification: &NotificationRecord) -> Result<(), DeliveryError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.latency).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DeliveryError::Failed {
                    message: "smtp refused".to_string(),
                });
            }
            Ok(())
        }
    }

    fn worker_with(
        outbox: Arc<dyn NotificationOutbox>,
        adapter: Arc<dyn Delivery>,
        config: OutboxWorkerConfig,
    ) -> OutboxWorker {
        let router = Arc::new(DeliveryRouter::builder().fallback(adapter).build());
        OutboxWorker::new(outbox, router, config)
    }

    #[tokio::test]
    async fn successful_delivery_marks_sent() {
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.insert(notification("u1", "url_unhealthy")).await.unwrap();

        let adapter = Arc::new(CountingDelivery::ok(Duration::ZERO));
        let worker = worker_with(outbox.clone(), adapter.clone(), OutboxWorkerConfig::default());

        let dispatched = worker.drain_once().await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outbox.rows()[0].status, DeliveryStatus::Sent);
        assert!(outbox.rows()[0].updated_at >= outbox.rows()[0].created_at);
    }

    #[tokio::test]
    async fn failed_delivery_marks_failed_and_is_not_retried() {
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.insert(notification("u1", "url_unhealthy")).await.unwrap();

        let adapter = Arc::new(CountingDelivery::failing());
        let worker = worker_with(outbox.clone(), adapter.clone(), OutboxWorkerConfig::default());

        worker.drain_once().await.unwrap();
        assert_eq!(outbox.rows()[0].status, DeliveryStatus::Failed);

        // terminal rows are not revisited on the next tick
        let dispatched = worker.drain_once().await.unwrap();
        assert_eq!(dispatched, 0);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_delivery_times_out_as_failed() {
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.insert(notification("u1", "url_unhealthy")).await.unwrap();

        let adapter = Arc::new(CountingDelivery::ok(Duration::from_secs(5)));
        let worker = worker_with(
            outbox.clone(),
            adapter,
            OutboxWorkerConfig {
                dispatch_timeout: Duration::from_millis(20),
                ..OutboxWorkerConfig::default()
            },
        );

        worker.drain_once().await.unwrap();
        assert_eq!(outbox.rows()[0].status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn unroutable_kind_is_marked_failed() {
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.insert(notification("u1", "carrier_pigeon")).await.unwrap();

        let router = Arc::new(DeliveryRouter::builder().build());
        let worker = OutboxWorker::new(outbox.clone(), router, OutboxWorkerConfig::default());

        worker.drain_once().await.unwrap();
        assert_eq!(outbox.rows()[0].status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn dispatch_concurrency_is_capped() {
        let outbox = Arc::new(MemoryOutbox::new());
        for i in 0..30 {
            outbox
                .insert(notification(&format!("u{i}"), "url_unhealthy"))
                .await
                .unwrap();
        }

        let adapter = Arc::new(CountingDelivery::ok(Duration::from_millis(10)));
        let worker = worker_with(
            outbox.clone(),
            adapter.clone(),
            OutboxWorkerConfig {
                outbox_concurrency: 4,
                ..OutboxWorkerConfig::default()
            },
        );

        let dispatched = worker.drain_once().await.unwrap();
        assert_eq!(dispatched, 30);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 30);
        assert!(adapter.peak.load(Ordering::SeqCst) <= 4);
        assert!(outbox
            .rows()
            .iter()
            .all(|row| row.status == DeliveryStatus::Sent));
    }

    #[tokio::test]
    async fn run_loop_drains_and_stops_on_cancel() {
        let outbox = Arc::new(MemoryOutbox::new());
        outbox.insert(notification("u1", "url_unhealthy")).await.unwrap();

        let adapter = Arc::new(CountingDelivery::ok(Duration::ZERO));
        let worker = Arc::new(worker_with(
            outbox.clone(),
            adapter,
            OutboxWorkerConfig {
                outbox_period: Duration::from_millis(20),
                ..OutboxWorkerConfig::default()
            },
        ));

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let runner = worker.clone();
        let handle = tokio::spawn(async move { runner.run(token).await });

        let start = tokio::time::Instant::now();
        while outbox.rows()[0].status == DeliveryStatus::Pending
            && start.elapsed() < Duration::from_secs(2)
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(outbox.rows()[0].status, DeliveryStatus::Sent);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop after cancellation")
            .unwrap();
    }
}
