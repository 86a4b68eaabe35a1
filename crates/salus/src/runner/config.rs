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

//! Pipeline configuration.
//!
//! Aggregates the per-component configs into one value per process.
//! Loading these from the environment or a file is the embedding binary's
//! concern; defaults follow the service's operational defaults.

use std::time::Duration;

use crate::events::{EventConsumerConfig, ProducerConfig};
use crate::probe::ProbeSchedulerConfig;
use crate::worker::OutboxWorkerConfig;

/// Configuration of the probe-side process.
#[derive(Debug, Clone)]
pub struct ProbePipelineConfig {
    pub scheduler: ProbeSchedulerConfig,
    pub producer: ProducerConfig,
    /// Overall shutdown deadline for the whole pipeline.
    pub shutdown_grace: Duration,
}

impl Default for ProbePipelineConfig {
    fn default() -> Self {
        Self {
            scheduler: ProbeSchedulerConfig::default(),
            producer: ProducerConfig::default(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

/// Configuration of the notification-side process.
#[derive(Debug, Clone)]
pub struct NotificationPipelineConfig {
    pub consumer: EventConsumerConfig,
    pub worker: OutboxWorkerConfig,
    /// Overall shutdown deadline for the whole pipeline.
    pub shutdown_grace: Duration,
}

impl Default for NotificationPipelineConfig {
    fn default() -> Self {
        Self {
            consumer: EventConsumerConfig::default(),
            worker: OutboxWorkerConfig::default(),
            shutdown_grace: Duration::from_secs(10),
        }
    }
}
