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

//! Domain Models
//!
//! Domain structures shared across the probe and notification pipelines:
//! URL records with their health status, and the notification types that
//! travel from the probe side over the bus into the delivery outbox.
//!
//! These are API-level types; storage-backed models live behind the
//! registry and outbox ports.

pub mod notification;
pub mod url;

pub use notification::{
    DeliveryStatus, NewNotification, Notification, NotificationRecord, EVENT_URL_UNHEALTHY,
};
pub use url::{UrlRecord, UrlStatus};
