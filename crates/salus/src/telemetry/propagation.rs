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

//! W3C Trace Context Propagation
//!
//! Bus messages carry trace context in their headers (`traceparent`,
//! optional `tracestate`) so the consumer can continue the span started on
//! the probe side. The carrier is the message header list; injection happens
//! at enqueue time, extraction on receipt.
//!
//! Only the textmap format lives here. Exporting spans is a sink concern
//! and stays outside the core.

use rand::Rng;
use std::fmt;

/// Header key for the W3C `traceparent` field.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Header key for the optional W3C `tracestate` field.
pub const TRACESTATE_HEADER: &str = "tracestate";

/// A W3C Trace Context: trace id, parent span id, sampled flag and the
/// opaque `tracestate` passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: u128,
    pub span_id: u64,
    pub sampled: bool,
    pub state: Option<String>,
}

impl TraceContext {
    /// Generates a fresh sampled context with random non-zero identifiers.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut trace_id: u128 = rng.gen();
        while trace_id == 0 {
            trace_id = rng.gen();
        }
        let mut span_id: u64 = rng.gen();
        while span_id == 0 {
            span_id = rng.gen();
        }
        Self {
            trace_id,
            span_id,
            sampled: true,
            state: None,
        }
    }

    /// Formats the `traceparent` header value (version 00).
    pub fn traceparent(&self) -> String {
        format!(
            "00-{:032x}-{:016x}-{:02x}",
            self.trace_id,
            self.span_id,
            if self.sampled { 1 } else { 0 }
        )
    }

    /// Writes `traceparent` (and `tracestate` when present) into a header
    /// carrier, replacing any existing values.
    pub fn inject(&self, headers: &mut Vec<(String, String)>) {
        headers.retain(|(key, _)| key != TRACEPARENT_HEADER && key != TRACESTATE_HEADER);
        headers.push((TRACEPARENT_HEADER.to_string(), self.traceparent()));
        if let Some(state) = &self.state {
            headers.push((TRACESTATE_HEADER.to_string(), state.clone()));
        }
    }

    /// Reads trace context out of a header carrier. Returns `None` when the
    /// `traceparent` header is absent or malformed.
    pub fn extract(headers: &[(String, String)]) -> Option<Self> {
        let value = headers
            .iter()
            .find(|(key, _)| key == TRACEPARENT_HEADER)
            .map(|(_, value)| value.as_str())?;
        let mut context = Self::parse(value)?;
        context.state = headers
            .iter()
            .find(|(key, _)| key == TRACESTATE_HEADER)
            .map(|(_, value)| value.clone());
        Some(context)
    }

    fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        if version != "00" || trace_id.len() != 32 || span_id.len() != 16 || flags.len() != 2 {
            return None;
        }
        let trace_id = u128::from_str_radix(trace_id, 16).ok()?;
        let span_id = u64::from_str_radix(span_id, 16).ok()?;
        // all-zero identifiers are invalid in W3C Trace Context
        if trace_id == 0 || span_id == 0 {
            return None;
        }
        let flags = u8::from_str_radix(flags, 16).ok()?;

        Some(Self {
            trace_id,
            span_id,
            sampled: flags & 0x01 == 0x01,
            state: None,
        })
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.traceparent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traceparent_round_trip() {
        let context = TraceContext::generate();
        let mut headers = Vec::new();
        context.inject(&mut headers);

        let extracted = TraceContext::extract(&headers).unwrap();
        assert_eq!(extracted.trace_id, context.trace_id);
        assert_eq!(extracted.span_id, context.span_id);
        assert!(extracted.sampled);
    }

    #[test]
    fn tracestate_is_passed_through() {
        let mut context = TraceContext::generate();
        context.state = Some("vendor=opaque".to_string());
        let mut headers = Vec::new();
        context.inject(&mut headers);

        let extracted = TraceContext::extract(&headers).unwrap();
        assert_eq!(extracted.state.as_deref(), Some("vendor=opaque"));
    }

    #[test]
    fn inject_replaces_existing_headers() {
        let mut headers = vec![(TRACEPARENT_HEADER.to_string(), "00-bad".to_string())];
        let context = TraceContext::generate();
        context.inject(&mut headers);

        let values: Vec<_> = headers
            .iter()
            .filter(|(key, _)| key == TRACEPARENT_HEADER)
            .collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].1, context.traceparent());
    }

    #[test]
    fn malformed_traceparent_is_rejected() {
        for bad in [
            "",
            "00-short-0000000000000001-01",
            "ff-00000000000000000000000000000001-0000000000000001-01",
            &format!("00-{:032x}-{:016x}-01", 0u128, 1u64),
        ] {
            let headers = vec![(TRACEPARENT_HEADER.to_string(), bad.to_string())];
            assert!(TraceContext::extract(&headers).is_none(), "accepted {bad:?}");
        }
    }
}
