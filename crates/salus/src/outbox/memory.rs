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

//! In-memory notification outbox.
//!
//! Reference implementation of [`NotificationOutbox`] for tests and local
//! development. Ids are assigned from a monotonic counter; the terminal
//! status invariant is enforced at the store level.

use chrono::Utc;
use parking_lot::Mutex;
use tracing::warn;

use super::NotificationOutbox;
use crate::error::OutboxError;
use crate::models::{DeliveryStatus, NewNotification, NotificationRecord};

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<NotificationRecord>,
    next_id: i64,
}

/// Thread-safe in-memory [`NotificationOutbox`].
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    inner: Mutex<Inner>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row, for inspection in tests.
    pub fn rows(&self) -> Vec<NotificationRecord> {
        self.inner.lock().rows.clone()
    }
}

#[async_trait::async_trait]
impl NotificationOutbox for MemoryOutbox {
    async fn insert(
        &self,
        notification: NewNotification,
    ) -> Result<NotificationRecord, OutboxError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let now = Utc::now();
        let record = NotificationRecord {
            id: inner.next_id,
            url_id: notification.url_id,
            kind: notification.kind,
            message: notification.message,
            status: DeliveryStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        inner.rows.push(record.clone());
        Ok(record)
    }

    async fn get_pending(&self) -> Result<Vec<NotificationRecord>, OutboxError> {
        Ok(self
            .inner
            .lock()
            .rows
            .iter()
            .filter(|row| row.status == DeliveryStatus::Pending)
            .cloned()
            .collect())
    }

    async fn update_status(&self, id: i64, status: DeliveryStatus) -> Result<(), OutboxError> {
        let mut inner = self.inner.lock();
        let row = inner
            .rows
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or(OutboxError::NotFound { id })?;

        // terminal rows are final
        if row.status.is_terminal() {
            warn!(id, current = %row.status, requested = %status, "ignoring status update on terminal row");
            return Ok(());
        }

        row.status = status;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn ping(&self) -> Result<(), OutboxError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(url_id: &str) -> NewNotification {
        NewNotification {
            url_id: url_id.to_string(),
            kind: "url_unhealthy".to_string(),
            message: "URL is unreachable".to_string(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_monotonic_ids_and_pending_status() {
        let outbox = MemoryOutbox::new();
        let first = outbox.insert(notification("u1")).await.unwrap();
        let second = outbox.insert(notification("u2")).await.unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.status, DeliveryStatus::Pending);
        assert!(first.updated_at >= first.created_at);
    }

    #[tokio::test]
    async fn get_pending_filters_terminal_rows() {
        let outbox = MemoryOutbox::new();
        let row = outbox.insert(notification("u1")).await.unwrap();
        outbox.insert(notification("u2")).await.unwrap();

        outbox
            .update_status(row.id, DeliveryStatus::Sent)
            .await
            .unwrap();

        let pending = outbox.get_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url_id, "u2");
    }

    #[tokio::test]
    async fn terminal_rows_never_change_again() {
        let outbox = MemoryOutbox::new();
        let row = outbox.insert(notification("u1")).await.unwrap();

        outbox
            .update_status(row.id, DeliveryStatus::Failed)
            .await
            .unwrap();
        outbox
            .update_status(row.id, DeliveryStatus::Sent)
            .await
            .unwrap();

        assert_eq!(outbox.rows()[0].status, DeliveryStatus::Failed);
    }

    #[tokio::test]
    async fn update_status_unknown_id_is_not_found() {
        let outbox = MemoryOutbox::new();
        let err = outbox
            .update_status(42, DeliveryStatus::Sent)
            .await
            .unwrap_err();
        assert!(matches!(err, OutboxError::NotFound { id: 42 }));
    }
}
