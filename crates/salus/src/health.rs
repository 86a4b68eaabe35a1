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

//! Service health checks.
//!
//! Liveness always passes while the process runs; readiness pings the
//! backing store under a short deadline so a wedged database takes the
//! instance out of rotation without hanging the probe endpoint.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error};

use crate::error::OutboxError;
use crate::outbox::NotificationOutbox;

/// Liveness and readiness checks over the outbox store.
pub struct HealthService {
    store: Arc<dyn NotificationOutbox>,
    readiness_timeout: Duration,
}

impl HealthService {
    pub fn new(store: Arc<dyn NotificationOutbox>) -> Self {
        Self {
            store,
            readiness_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_readiness_timeout(mut self, readiness_timeout: Duration) -> Self {
        self.readiness_timeout = readiness_timeout;
        self
    }

    /// Process-is-alive check; never fails.
    pub fn liveness(&self) {
        debug!("liveness check passed");
    }

    /// Store connectivity check under the readiness deadline.
    pub async fn readiness(&self) -> Result<(), OutboxError> {
        match timeout(self.readiness_timeout, self.store.ping()).await {
            Ok(Ok(())) => {
                debug!("readiness check passed");
                Ok(())
            }
            Ok(Err(error)) => {
                error!(%error, "readiness check failed");
                Err(error)
            }
            Err(_) => {
                let error = OutboxError::Unavailable {
                    message: format!("ping exceeded {:?}", self.readiness_timeout),
                };
                error!(%error, "readiness check failed");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeliveryStatus, NewNotification, NotificationRecord};
    use crate::outbox::MemoryOutbox;
    use async_trait::async_trait;

    #[tokio::test]
    async fn readiness_passes_on_healthy_store() {
        let health = HealthService::new(Arc::new(MemoryOutbox::new()));
        health.liveness();
        health.readiness().await.unwrap();
    }

    struct WedgedStore;

    #[async_trait]
    impl NotificationOutbox for WedgedStore {
        async fn insert(
            &self,
            _notification: NewNotification,
        ) -> Result<NotificationRecord, OutboxError> {
            unimplemented!("not used")
        }

        async fn get_pending(&self) -> Result<Vec<NotificationRecord>, OutboxError> {
            Ok(Vec::new())
        }

        async fn update_status(&self, _id: i64, _status: DeliveryStatus) -> Result<(), OutboxError> {
            Ok(())
        }

        async fn ping(&self) -> Result<(), OutboxError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn readiness_fails_when_ping_exceeds_deadline() {
        let health = HealthService::new(Arc::new(WedgedStore))
            .with_readiness_timeout(Duration::from_millis(20));
        let err = health.readiness().await.unwrap_err();
        assert!(matches!(err, OutboxError::Unavailable { .. }));
    }
}
