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

//! Notification Models
//!
//! Two closely related shapes live here:
//!
//! - [`Notification`] is the immutable wire-level event published to the bus
//!   when a URL transitions into an unhealthy state.
//! - [`NotificationRecord`] is the durable outbox row the consumer creates
//!   from a wire event and the worker drains toward delivery.
//!
//! Outbox rows are created in `pending` and move exactly once to a terminal
//! status (`sent` or `failed`); terminal rows are never updated again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::url::UrlRecord;

/// Event kind published when a URL transitions into `down`.
pub const EVENT_URL_UNHEALTHY: &str = "url_unhealthy";

/// Delivery state of an outbox row.
///
/// The lattice is `pending < {sent, failed}`: rows start `pending` and take
/// exactly one step to a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Persisted, not yet dispatched.
    Pending,
    /// Dispatched successfully.
    Sent,
    /// Dispatch failed for this attempt.
    Failed,
}

impl DeliveryStatus {
    /// Returns the canonical lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }

    /// True for `sent` and `failed`; terminal rows are never revisited.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire-level notification event (JSON, UTF-8).
///
/// Immutable once produced. The bus record carrying it is keyed by `url_id`
/// so all events for one URL share a partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// The URL this event concerns.
    pub url_id: String,
    /// Event kind tag, e.g. [`EVENT_URL_UNHEALTHY`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description for end-user delivery.
    pub message: String,
    /// Initial delivery state carried on the wire; always `pending`.
    pub status: DeliveryStatus,
    /// When the producing side observed the transition (RFC3339).
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Builds the `url_unhealthy` event for a URL observed down.
    pub fn url_unhealthy(url: &UrlRecord, observed_at: DateTime<Utc>) -> Self {
        Self {
            url_id: url.id.clone(),
            kind: EVENT_URL_UNHEALTHY.to_string(),
            message: format!("URL {} is unreachable", url.address),
            status: DeliveryStatus::Pending,
            created_at: observed_at,
        }
    }
}

/// Fields for inserting a new outbox row; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewNotification {
    /// The URL the notification concerns.
    pub url_id: String,
    /// Event kind tag, routed to a delivery adapter.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

impl From<Notification> for NewNotification {
    fn from(event: Notification) -> Self {
        Self {
            url_id: event.url_id,
            kind: event.kind,
            message: event.message,
        }
    }
}

/// A durable outbox row (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Monotonic integer assigned by the store.
    pub id: i64,
    /// The URL the notification concerns.
    pub url_id: String,
    /// Event kind tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable description.
    pub message: String,
    /// Delivery state; monotone, terminal states final.
    pub status: DeliveryStatus,
    /// When the row was inserted.
    pub created_at: DateTime<Utc>,
    /// When the row last changed; always >= `created_at`.
    pub updated_at: DateTime<Utc>,
}
