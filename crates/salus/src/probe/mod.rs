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

//! Probe Execution
//!
//! A probe is one HTTP GET against a URL's address, classified into `up` or
//! `down`. Probing never fails: network errors, timeouts and bad status
//! codes are data, not errors.
//!
//! [`HttpProber`] is the production implementation; the [`Prober`] seam
//! exists so the scheduler can be driven with scripted outcomes in tests.

pub mod recorder;
pub mod scheduler;

pub use recorder::StatusRecorder;
pub use scheduler::{ProbeScheduler, ProbeSchedulerConfig};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::PipelineError;
use crate::models::UrlStatus;
use crate::telemetry::{Telemetry, URL_CHECK_DURATION_SECONDS, URL_CHECK_STATUS_TOTAL};

/// Performs a single health probe against an address.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probes the address and classifies the outcome. Never fails.
    async fn probe(&self, address: &str) -> UrlStatus;
}

/// Configuration for [`HttpProber`].
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Per-request deadline covering the whole call.
    pub request_timeout: Duration,
    /// Connection establishment timeout on the shared client.
    pub connect_timeout: Duration,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP GET prober over a shared client.
///
/// A response with status code < 400 is `up`; any error, timeout, DNS
/// failure or status >= 400 is `down`. Redirects are followed by the
/// client's default policy. The response body is dropped without being
/// read, releasing the connection back to the pool.
pub struct HttpProber {
    client: reqwest::Client,
    request_timeout: Duration,
    telemetry: Arc<dyn Telemetry>,
}

impl HttpProber {
    /// Builds the prober and its shared HTTP client.
    pub fn new(config: ProberConfig, telemetry: Arc<dyn Telemetry>) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| PipelineError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            request_timeout: config.request_timeout,
            telemetry,
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, address: &str) -> UrlStatus {
        let start = Instant::now();
        let status = match self
            .client
            .get(address)
            .timeout(self.request_timeout)
            .send()
            .await
        {
            Ok(response) if response.status().as_u16() < 400 => UrlStatus::Up,
            Ok(response) => {
                warn!(address, status = %response.status(), "unhealthy HTTP status code");
                UrlStatus::Down
            }
            Err(error) => {
                warn!(address, %error, "HTTP request failed");
                UrlStatus::Down
            }
        };

        let labels = [("status", status.as_str().to_string())];
        self.telemetry.increment_counter(URL_CHECK_STATUS_TOTAL, &labels);
        self.telemetry.observe_histogram(
            URL_CHECK_DURATION_SECONDS,
            &labels,
            start.elapsed().as_secs_f64(),
        );
        status
    }
}
