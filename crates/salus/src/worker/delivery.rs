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

//! Delivery Adapters
//!
//! A delivery adapter performs the user-facing side-effect for one
//! notification (email, webhook, chat message, ...). Adapters are opaque to
//! the worker; the only requirements are that `deliver` returns within a
//! bounded time and reports success or failure.
//!
//! Routing is static: [`DeliveryRouter`] maps notification kinds to
//! adapters once at startup, with an optional fallback for unmapped kinds.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::DeliveryError;
use crate::models::NotificationRecord;

/// Performs the side-effect for one notification.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, notification: &NotificationRecord) -> Result<(), DeliveryError>;
}

/// Static kind-to-adapter mapping, resolved once at startup.
pub struct DeliveryRouter {
    routes: HashMap<String, Arc<dyn Delivery>>,
    fallback: Option<Arc<dyn Delivery>>,
}

impl DeliveryRouter {
    pub fn builder() -> DeliveryRouterBuilder {
        DeliveryRouterBuilder {
            routes: HashMap::new(),
            fallback: None,
        }
    }

    /// Routes a notification to its adapter by kind.
    pub async fn deliver(&self, notification: &NotificationRecord) -> Result<(), DeliveryError> {
        let adapter = self
            .routes
            .get(&notification.kind)
            .or(self.fallback.as_ref())
            .ok_or_else(|| DeliveryError::NoRoute {
                kind: notification.kind.clone(),
            })?;
        adapter.deliver(notification).await
    }
}

/// Builder for [`DeliveryRouter`].
pub struct DeliveryRouterBuilder {
    routes: HashMap<String, Arc<dyn Delivery>>,
    fallback: Option<Arc<dyn Delivery>>,
}

impl DeliveryRouterBuilder {
    /// Registers an adapter for a notification kind.
    pub fn route(mut self, kind: &str, adapter: Arc<dyn Delivery>) -> Self {
        self.routes.insert(kind.to_string(), adapter);
        self
    }

    /// Registers the adapter used when no kind matches.
    pub fn fallback(mut self, adapter: Arc<dyn Delivery>) -> Self {
        self.fallback = Some(adapter);
        self
    }

    pub fn build(self) -> DeliveryRouter {
        DeliveryRouter {
            routes: self.routes,
            fallback: self.fallback,
        }
    }
}

/// Development adapter: logs the notification and simulates send latency.
#[derive(Debug, Clone)]
pub struct LogDelivery {
    latency: Duration,
}

impl LogDelivery {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for LogDelivery {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(500),
        }
    }
}

#[async_trait]
impl Delivery for LogDelivery {
    async fn deliver(&self, notification: &NotificationRecord) -> Result<(), DeliveryError> {
        info!(
            id = notification.id,
            kind = %notification.kind,
            url_id = %notification.url_id,
            "delivering notification"
        );
        tokio::time::sleep(self.latency).await;
        Ok(())
    }
}
