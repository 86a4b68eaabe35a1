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

//! Notification Outbox Port
//!
//! The durable queue of pending notifications on the consumer side. The
//! consumer inserts rows in `pending`; the worker drains them toward a
//! terminal status. Rows are never destroyed by the core; archival is an
//! external concern.
//!
//! `ping` exists solely for readiness probing of the backing store.

pub mod memory;

pub use memory::MemoryOutbox;

use async_trait::async_trait;

use crate::error::OutboxError;
use crate::models::{DeliveryStatus, NewNotification, NotificationRecord};

/// Capability set the notification pipeline requires from the outbox store.
#[async_trait]
pub trait NotificationOutbox: Send + Sync {
    /// Inserts a new row in `pending` and returns it with its assigned id
    /// and timestamps.
    async fn insert(&self, notification: NewNotification)
        -> Result<NotificationRecord, OutboxError>;

    /// Returns every row currently in `pending`, oldest first.
    async fn get_pending(&self) -> Result<Vec<NotificationRecord>, OutboxError>;

    /// Transitions a row to the given status and refreshes `updated_at`.
    ///
    /// Terminal rows (`sent`, `failed`) must never change again; the worker
    /// is the sole caller and only moves rows out of `pending`.
    async fn update_status(&self, id: i64, status: DeliveryStatus) -> Result<(), OutboxError>;

    /// Cheap connectivity check, used only by readiness probing.
    async fn ping(&self) -> Result<(), OutboxError>;
}
