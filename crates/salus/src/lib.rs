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

//! # Salus
//!
//! Core pipeline of a multi-tenant URL health-checking service. Tenants
//! register HTTP(S) endpoints; a background prober polls them, records
//! reachability, and publishes an event whenever an endpoint transitions
//! into an unhealthy state. On the consuming side the events are landed in
//! a durable outbox and drained toward pluggable delivery channels.
//!
//! The crate is the **core** of that service: the probe scheduler, the
//! at-least-once event-bus bridge, and the outbox worker, plus the ports
//! they consume. HTTP routing, identity, relational storage, broker clients
//! and metric sinks live outside and plug in through the ports.
//!
//! ## Architecture
//!
//! Two processes compose the pipeline:
//!
//! - **Probe side** ([`runner::ProbePipeline`]): [`probe::ProbeScheduler`]
//!   sweeps the [`registry::UrlRegistry`] snapshot on a fixed period,
//!   fanning out [`probe::Prober`] calls under a concurrency cap.
//!   [`probe::StatusRecorder`] persists each outcome and, on the edge into
//!   `down`, hands a [`models::Notification`] to the buffered
//!   [`events::EventProducer`], which keys it by URL and publishes through
//!   the bus client's channel surface.
//! - **Notification side** ([`runner::NotificationPipeline`]):
//!   [`events::EventConsumer`] lands events in the
//!   [`outbox::NotificationOutbox`] before committing offsets;
//!   [`worker::OutboxWorker`] periodically drains pending rows through a
//!   [`worker::DeliveryRouter`] to the registered delivery adapters.
//!
//! Delivery is at-least-once end to end: offsets never advance past an
//! uninserted message, broker sends are acknowledged by all in-sync
//! replicas, and duplicates are tolerated everywhere downstream.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use salus::bus::InMemoryBus;
//! use salus::probe::{HttpProber, ProberConfig};
//! use salus::registry::MemoryUrlRegistry;
//! use salus::runner::{ProbePipeline, ProbePipelineConfig};
//! use salus::telemetry::MetricsTelemetry;
//!
//! let registry = Arc::new(MemoryUrlRegistry::new());
//! registry.register("tenant-1", "https://example.com/health")?;
//!
//! let telemetry = Arc::new(MetricsTelemetry);
//! let prober = Arc::new(HttpProber::new(ProberConfig::default(), telemetry.clone())?);
//! let bus = InMemoryBus::new("notifications", 4);
//!
//! let pipeline = ProbePipeline::start(
//!     registry,
//!     prober,
//!     bus.producer(1024),
//!     ProbePipelineConfig::default(),
//!     telemetry,
//! );
//!
//! salus::runner::wait_for_shutdown_signal().await;
//! pipeline.shutdown().await?;
//! ```

pub mod bus;
pub mod error;
pub mod events;
pub mod health;
pub mod models;
pub mod outbox;
pub mod probe;
pub mod registry;
pub mod runner;
pub mod telemetry;
pub mod worker;

pub use error::{
    ConsumeError, DeliveryError, OutboxError, PipelineError, PublishError, RegistryError,
};
pub use health::HealthService;
pub use models::{
    DeliveryStatus, NewNotification, Notification, NotificationRecord, UrlRecord, UrlStatus,
};
pub use runner::{
    wait_for_shutdown_signal, NotificationPipeline, NotificationPipelineConfig, ProbePipeline,
    ProbePipelineConfig,
};
