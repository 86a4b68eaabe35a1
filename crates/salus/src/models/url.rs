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

//! URL Record Model
//!
//! A URL record is the unit of monitoring: an address registered by a tenant,
//! the last observed health status, and the time of the last completed probe.
//!
//! Status ownership: the probe pipeline's status recorder is the sole writer
//! of `status` and `checked_at`; record creation happens at the registry
//! boundary (external API).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observed health of a monitored URL.
///
/// `Unknown` is the initial state of a record that has never been probed.
/// Every completed probe yields either `Up` or `Down`; probes never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlStatus {
    /// Never probed.
    Unknown,
    /// Last probe received a response with status code < 400.
    Up,
    /// Last probe errored, timed out, or received a status code >= 400.
    Down,
}

impl UrlStatus {
    /// Returns the canonical lowercase string used on the wire and in labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlStatus::Unknown => "unknown",
            UrlStatus::Up => "up",
            UrlStatus::Down => "down",
        }
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monitored URL (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Unique identifier, tenant-scoped.
    pub id: String,
    /// Owning tenant; immutable after creation.
    pub tenant_id: String,
    /// Absolute http(s) address; immutable after creation, unique per tenant.
    pub address: String,
    /// Last observed health status.
    pub status: UrlStatus,
    /// Timestamp of the last completed probe; `None` until first probed.
    /// Monotonically non-decreasing per record.
    pub checked_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_are_closed_set() {
        assert_eq!(UrlStatus::Unknown.as_str(), "unknown");
        assert_eq!(UrlStatus::Up.as_str(), "up");
        assert_eq!(UrlStatus::Down.as_str(), "down");
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&UrlStatus::Down).unwrap(), "\"down\"");
        let parsed: UrlStatus = serde_json::from_str("\"up\"").unwrap();
        assert_eq!(parsed, UrlStatus::Up);
    }
}
