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

//! Telemetry Port
//!
//! Counters and histograms are emitted through an injected [`Telemetry`]
//! value rather than a process-wide registry, so tests can assert on
//! recorded observations in memory. The production implementation forwards
//! to the `metrics` facade; spans belong to the `tracing` ecosystem and are
//! not part of this port.
//!
//! W3C Trace Context propagation over bus message headers lives in
//! [`propagation`].

pub mod propagation;

pub use propagation::TraceContext;

use parking_lot::Mutex;
use std::collections::HashMap;

/// Counter: total HTTP requests served at the API boundary.
///
/// Incremented by the embedding HTTP adapter, not by the core pipeline;
/// the name is defined here so both sides agree on it.
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// Counter: completed probes, labelled by observed status.
pub const URL_CHECK_STATUS_TOTAL: &str = "url_check_status_total";

/// Histogram: wall-clock probe duration in seconds, labelled by status.
pub const URL_CHECK_DURATION_SECONDS: &str = "url_check_duration_seconds";

/// Capability set for emitting metrics.
///
/// Implementations must be cheap and non-blocking; the probe path calls
/// this once per probe.
pub trait Telemetry: Send + Sync {
    /// Increments a monotonic counter by one.
    fn increment_counter(&self, name: &'static str, labels: &[(&'static str, String)]);

    /// Records one observation into a histogram.
    fn observe_histogram(&self, name: &'static str, labels: &[(&'static str, String)], value: f64);
}

/// Telemetry backed by the `metrics` facade.
///
/// Whatever recorder the embedding process installs (Prometheus exporter,
/// statsd, ...) receives the observations; with no recorder installed the
/// macros are no-ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsTelemetry;

impl Telemetry for MetricsTelemetry {
    fn increment_counter(&self, name: &'static str, labels: &[(&'static str, String)]) {
        let labels: Vec<metrics::Label> = labels
            .iter()
            .map(|(key, value)| metrics::Label::new(*key, value.clone()))
            .collect();
        metrics::counter!(name, labels).increment(1);
    }

    fn observe_histogram(&self, name: &'static str, labels: &[(&'static str, String)], value: f64) {
        let labels: Vec<metrics::Label> = labels
            .iter()
            .map(|(key, value)| metrics::Label::new(*key, value.clone()))
            .collect();
        metrics::histogram!(name, labels).record(value);
    }
}

/// Telemetry that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn increment_counter(&self, _name: &'static str, _labels: &[(&'static str, String)]) {}

    fn observe_histogram(
        &self,
        _name: &'static str,
        _labels: &[(&'static str, String)],
        _value: f64,
    ) {
    }
}

/// In-memory telemetry for tests: records every observation for assertion.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    counters: Mutex<HashMap<String, u64>>,
    histograms: Mutex<HashMap<String, Vec<f64>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, 0 if never incremented.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let key = Self::key(name, labels);
        self.counters.lock().get(&key).copied().unwrap_or(0)
    }

    /// All observations recorded into a histogram.
    pub fn observations(&self, name: &str, labels: &[(&str, &str)]) -> Vec<f64> {
        let key = Self::key(name, labels);
        self.histograms.lock().get(&key).cloned().unwrap_or_default()
    }

    fn key(name: &str, labels: &[(&str, &str)]) -> String {
        let mut labels: Vec<String> = labels
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        labels.sort();
        format!("{name}{{{}}}", labels.join(","))
    }
}

impl Telemetry for RecordingTelemetry {
    fn increment_counter(&self, name: &'static str, labels: &[(&'static str, String)]) {
        let labels: Vec<(&str, &str)> = labels
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        *self
            .counters
            .lock()
            .entry(Self::key(name, &labels))
            .or_insert(0) += 1;
    }

    fn observe_histogram(&self, name: &'static str, labels: &[(&'static str, String)], value: f64) {
        let labels: Vec<(&str, &str)> = labels
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .collect();
        self.histograms
            .lock()
            .entry(Self::key(name, &labels))
            .or_default()
            .push(value);
    }
}
