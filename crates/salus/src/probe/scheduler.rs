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

//! Probe Scheduler
//!
//! Drives the probe side: on every tick it loads the URL snapshot and fans
//! probes out under a bounded concurrency budget, funnelling each outcome
//! into the status recorder.
//!
//! Two rules bound the fan-out:
//! - at most `probe_concurrency` probes run at any instant (semaphore), and
//! - at most one probe is in flight per URL (in-flight set); a URL whose
//!   previous probe is still outstanding is skipped for this tick.
//!
//! Ticks that fire while a sweep is still dispatching are coalesced. On
//! cancellation the scheduler stops issuing probes and waits for in-flight
//! probes to finish, bounded by the HTTP client's own deadline.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use super::{Prober, StatusRecorder};
use crate::registry::UrlRegistry;

/// Configuration for [`ProbeScheduler`].
#[derive(Debug, Clone)]
pub struct ProbeSchedulerConfig {
    /// Sweep period.
    pub probe_period: Duration,
    /// Maximum number of probes in flight at any instant.
    pub probe_concurrency: usize,
}

impl Default for ProbeSchedulerConfig {
    fn default() -> Self {
        Self {
            probe_period: Duration::from_secs(60),
            probe_concurrency: 10,
        }
    }
}

/// Periodic fan-out of probes across the registered URL population.
pub struct ProbeScheduler {
    registry: Arc<dyn UrlRegistry>,
    prober: Arc<dyn Prober>,
    recorder: Arc<StatusRecorder>,
    config: ProbeSchedulerConfig,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    tracker: TaskTracker,
}

impl ProbeScheduler {
    pub fn new(
        registry: Arc<dyn UrlRegistry>,
        prober: Arc<dyn Prober>,
        recorder: StatusRecorder,
        config: ProbeSchedulerConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.probe_concurrency));
        Self {
            registry,
            prober,
            recorder: Arc::new(recorder),
            config,
            semaphore,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            tracker: TaskTracker::new(),
        }
    }

    /// Runs until `shutdown` is cancelled, then drains in-flight probes.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            period_secs = self.config.probe_period.as_secs_f64(),
            concurrency = self.config.probe_concurrency,
            "probe scheduler started"
        );

        let mut interval = time::interval(self.config.probe_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately; the first sweep happens one
        // full period after start, matching a plain ticker
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.sweep() => {}
                    }
                }
            }
        }

        self.tracker.close();
        self.tracker.wait().await;
        info!("probe scheduler stopped");
    }

    /// Performs one sweep: snapshot the registry, dispatch one probe per
    /// URL that has no probe outstanding.
    ///
    /// Dispatch blocks when the concurrency budget is exhausted, so a sweep
    /// over a large population can outlast the tick period; missed ticks
    /// coalesce into the next one.
    pub async fn sweep(&self) {
        let urls = match self.registry.list_all().await {
            Ok(urls) => urls,
            Err(error) => {
                error!(%error, "failed to load URL snapshot, skipping sweep");
                return;
            }
        };
        debug!(count = urls.len(), "sweep started");

        for url in urls {
            if self.in_flight.lock().contains(&url.id) {
                debug!(id = %url.id, "previous probe still in flight, skipping");
                continue;
            }

            let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                break;
            };
            self.in_flight.lock().insert(url.id.clone());

            let prober = Arc::clone(&self.prober);
            let recorder = Arc::clone(&self.recorder);
            let in_flight = Arc::clone(&self.in_flight);
            self.tracker.spawn(async move {
                let _permit = permit;
                let observed = prober.probe(&url.address).await;
                recorder.record(&url, observed).await;
                in_flight.lock().remove(&url.id);
            });
        }
    }
}
