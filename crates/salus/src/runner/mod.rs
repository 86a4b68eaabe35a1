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

//! Pipeline Lifecycle
//!
//! Wires the components of each process into a running pipeline and owns
//! their shutdown. Cancellation is hierarchical: each pipeline holds a root
//! token and hands child tokens to its components, so cancelling the
//! pipeline cancels everything underneath.
//!
//! Shutdown is bounded: components are cancelled, joined, and the producer
//! flushed, all under a single grace deadline. A phase that overruns its
//! budget is abandoned with a logged warning rather than blocking the
//! process.

pub mod config;

pub use config::{NotificationPipelineConfig, ProbePipelineConfig};

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bus::{BusConsumer, ProducerChannels};
use crate::error::PipelineError;
use crate::events::{EventConsumer, EventProducer};
use crate::outbox::NotificationOutbox;
use crate::probe::{ProbeScheduler, Prober, StatusRecorder};
use crate::registry::UrlRegistry;
use crate::telemetry::Telemetry;
use crate::worker::{DeliveryRouter, OutboxWorker};

/// The probe-side process: scheduler, recorder and event producer.
pub struct ProbePipeline {
    shutdown: CancellationToken,
    scheduler: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    producer: Arc<EventProducer>,
    config: ProbePipelineConfig,
}

impl ProbePipeline {
    /// Builds and starts the probe side. The scheduler begins sweeping one
    /// period after start.
    pub fn start(
        registry: Arc<dyn UrlRegistry>,
        prober: Arc<dyn Prober>,
        channels: ProducerChannels,
        config: ProbePipelineConfig,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        let shutdown = CancellationToken::new();

        let producer = Arc::new(EventProducer::start(
            channels,
            config.producer.clone(),
            telemetry,
            shutdown.child_token(),
        ));
        let recorder = StatusRecorder::new(Arc::clone(&registry), Arc::clone(&producer));
        let scheduler = ProbeScheduler::new(registry, prober, recorder, config.scheduler.clone());

        let token = shutdown.child_token();
        let handle = tokio::spawn(async move { scheduler.run(token).await });

        info!("probe pipeline started");
        Self {
            shutdown,
            scheduler: tokio::sync::Mutex::new(Some(handle)),
            producer,
            config,
        }
    }

    /// Stops probing, drains in-flight work and flushes the producer, all
    /// within the configured grace deadline.
    pub async fn shutdown(&self) -> Result<(), PipelineError> {
        info!("shutting down probe pipeline");
        self.shutdown.cancel();

        let drain = async {
            if let Some(handle) = self.scheduler.lock().await.take() {
                let _ = handle.await;
            }
            self.producer.close().await;
        };
        match timeout(self.config.shutdown_grace, drain).await {
            Ok(()) => {
                info!("probe pipeline stopped");
                Ok(())
            }
            Err(_) => {
                warn!(
                    grace_secs = self.config.shutdown_grace.as_secs_f64(),
                    "probe pipeline shutdown exceeded grace deadline, abandoning"
                );
                Err(PipelineError::ShutdownTimeout {
                    phase: "probe pipeline drain",
                    grace: self.config.shutdown_grace,
                })
            }
        }
    }
}

/// The notification-side process: event consumer and outbox worker.
pub struct NotificationPipeline {
    shutdown: CancellationToken,
    consumer: tokio::sync::Mutex<Option<JoinHandle<Result<(), crate::error::ConsumeError>>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    config: NotificationPipelineConfig,
}

impl NotificationPipeline {
    /// Builds and starts the notification side.
    pub fn start(
        bus_consumer: Box<dyn BusConsumer>,
        outbox: Arc<dyn NotificationOutbox>,
        router: Arc<DeliveryRouter>,
        config: NotificationPipelineConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();

        let consumer = EventConsumer::new(bus_consumer, Arc::clone(&outbox), config.consumer.clone());
        let consumer_token = shutdown.child_token();
        let consumer_handle = tokio::spawn(async move { consumer.run(consumer_token).await });

        let worker = OutboxWorker::new(outbox, router, config.worker.clone());
        let worker_token = shutdown.child_token();
        let worker_handle = tokio::spawn(async move { worker.run(worker_token).await });

        info!("notification pipeline started");
        Self {
            shutdown,
            consumer: tokio::sync::Mutex::new(Some(consumer_handle)),
            worker: tokio::sync::Mutex::new(Some(worker_handle)),
            config,
        }
    }

    /// Stops consuming and draining within the configured grace deadline.
    pub async fn shutdown(&self) -> Result<(), PipelineError> {
        info!("shutting down notification pipeline");
        self.shutdown.cancel();

        let drain = async {
            if let Some(handle) = self.consumer.lock().await.take() {
                let _ = handle.await;
            }
            if let Some(handle) = self.worker.lock().await.take() {
                let _ = handle.await;
            }
        };
        match timeout(self.config.shutdown_grace, drain).await {
            Ok(()) => {
                info!("notification pipeline stopped");
                Ok(())
            }
            Err(_) => {
                warn!(
                    grace_secs = self.config.shutdown_grace.as_secs_f64(),
                    "notification pipeline shutdown exceeded grace deadline, abandoning"
                );
                Err(PipelineError::ShutdownTimeout {
                    phase: "notification pipeline drain",
                    grace: self.config.shutdown_grace,
                })
            }
        }
    }
}

/// Blocks until the process receives an interrupt signal.
///
/// Embedding binaries call this between `start` and `shutdown`; a clean
/// shutdown afterwards maps to exit code 0.
pub async fn wait_for_shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for interrupt signal");
        return;
    }
    info!("interrupt received, shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::InMemoryBus;
    use crate::models::UrlStatus;
    use crate::outbox::MemoryOutbox;
    use crate::probe::ProbeSchedulerConfig;
    use crate::registry::MemoryUrlRegistry;
    use crate::telemetry::NoopTelemetry;
    use crate::worker::{Delivery, LogDelivery};
    use async_trait::async_trait;
    use std::time::Duration;

    struct UpProber;

    #[async_trait]
    impl crate::probe::Prober for UpProber {
        async fn probe(&self, _address: &str) -> UrlStatus {
            UrlStatus::Up
        }
    }

    #[tokio::test]
    async fn probe_pipeline_shuts_down_within_grace() {
        let registry = Arc::new(MemoryUrlRegistry::new());
        registry.register("t1", "http://ex.test/ok").unwrap();
        let bus = InMemoryBus::new("notifications", 1);

        let pipeline = ProbePipeline::start(
            registry,
            Arc::new(UpProber),
            bus.producer(64),
            ProbePipelineConfig {
                scheduler: ProbeSchedulerConfig {
                    probe_period: Duration::from_millis(20),
                    probe_concurrency: 2,
                },
                shutdown_grace: Duration::from_secs(2),
                ..ProbePipelineConfig::default()
            },
            Arc::new(NoopTelemetry),
        );

        tokio::time::sleep(Duration::from_millis(60)).await;
        pipeline.shutdown().await.unwrap();
        // a second shutdown is a no-op
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn notification_pipeline_shuts_down_within_grace() {
        let bus = InMemoryBus::new("notifications", 1);
        let outbox = Arc::new(MemoryOutbox::new());
        let router = Arc::new(
            DeliveryRouter::builder()
                .fallback(Arc::new(LogDelivery::new(Duration::from_millis(1))) as Arc<dyn Delivery>)
                .build(),
        );

        let pipeline = NotificationPipeline::start(
            Box::new(bus.consumer("notif")),
            outbox,
            router,
            NotificationPipelineConfig {
                shutdown_grace: Duration::from_secs(2),
                ..NotificationPipelineConfig::default()
            },
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        pipeline.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn overrunning_shutdown_is_abandoned_with_error() {
        struct StuckProber;

        #[async_trait]
        impl crate::probe::Prober for StuckProber {
            async fn probe(&self, _address: &str) -> UrlStatus {
                tokio::time::sleep(Duration::from_secs(30)).await;
                UrlStatus::Up
            }
        }

        let registry = Arc::new(MemoryUrlRegistry::new());
        registry.register("t1", "http://ex.test/stuck").unwrap();
        let bus = InMemoryBus::new("notifications", 1);

        let pipeline = ProbePipeline::start(
            registry,
            Arc::new(StuckProber),
            bus.producer(64),
            ProbePipelineConfig {
                scheduler: ProbeSchedulerConfig {
                    probe_period: Duration::from_millis(10),
                    probe_concurrency: 1,
                },
                shutdown_grace: Duration::from_millis(50),
                ..ProbePipelineConfig::default()
            },
            Arc::new(NoopTelemetry),
        );

        // let the stuck probe start
        tokio::time::sleep(Duration::from_millis(40)).await;
        let err = pipeline.shutdown().await.unwrap_err();
        assert!(matches!(err, PipelineError::ShutdownTimeout { .. }));
    }
}
