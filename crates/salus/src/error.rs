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

//! Error Types
//!
//! One enum per concern, grouped by the component that surfaces it. The
//! propagation policy is uniform: transient errors are logged and retried or
//! deferred to the next tick by the owning component; NotFound is locally
//! recovered; malformed bus payloads are skipped with their offset committed;
//! only fatal conditions bubble to the lifecycle owner.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`crate::registry::UrlRegistry`] implementations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The referenced URL record does not exist.
    #[error("URL {id} not found")]
    NotFound { id: String },

    /// The address is already registered for this tenant.
    #[error("URL address {address} already registered for tenant")]
    Conflict { address: String },

    /// The supplied address is not an absolute http(s) URL.
    #[error("invalid URL address {address}: {message}")]
    InvalidAddress { address: String, message: String },

    /// The backing store could not be reached; retried on the next tick.
    #[error("registry unavailable: {message}")]
    Unavailable { message: String },
}

/// Errors surfaced by [`crate::outbox::NotificationOutbox`] implementations.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// The referenced outbox row does not exist.
    #[error("notification {id} not found")]
    NotFound { id: i64 },

    /// The backing store could not be reached; retried on the next tick.
    #[error("outbox unavailable: {message}")]
    Unavailable { message: String },
}

/// Errors returned by [`crate::events::EventProducer::publish`].
#[derive(Debug, Error)]
pub enum PublishError {
    /// The producer has been closed; no new enqueues are accepted.
    #[error("event producer closed")]
    Closed,

    /// Shutdown was requested while waiting for queue capacity.
    #[error("publish cancelled by shutdown")]
    Cancelled,

    /// The notification could not be serialized to the wire format.
    #[error("failed to encode notification: {source}")]
    Encode {
        #[from]
        source: serde_json::Error,
    },
}

/// Errors surfaced by [`crate::bus::BusConsumer`] implementations.
#[derive(Debug, Error)]
pub enum ConsumeError {
    /// The consumer group was closed; the consume loop exits.
    #[error("consumer group closed")]
    Closed,

    /// A transient consume failure; retried with exponential backoff.
    #[error("transient consume failure: {message}")]
    Transient { message: String },
}

/// Errors returned by [`crate::worker::Delivery`] adapters and the router.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The dispatch deadline elapsed before the adapter returned.
    #[error("delivery timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// No adapter is registered for the notification kind.
    #[error("no delivery route for notification type {kind}")]
    NoRoute { kind: String },

    /// The adapter attempted the side-effect and failed.
    #[error("delivery failed: {message}")]
    Failed { message: String },
}

/// Fatal pipeline-level failures: construction and shutdown.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid configuration or a collaborator that could not be built.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A shutdown phase exceeded its grace deadline and was abandoned.
    #[error("shutdown phase {phase} exceeded grace deadline of {grace:?}")]
    ShutdownTimeout { phase: &'static str, grace: Duration },
}
