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

//! URL Registry Port
//!
//! The probe pipeline reaches the URL store through this port. The pipeline
//! needs exactly two capabilities: a full snapshot for the sweep, and a
//! status write-back per completed probe. Everything else about the registry
//! (creation, tenant-scoped listing, deletion) belongs to the external API
//! surface and never crosses into the core.
//!
//! [`MemoryUrlRegistry`] is the in-crate reference implementation backing
//! the test suite and local development.

pub mod memory;

pub use memory::MemoryUrlRegistry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RegistryError;
use crate::models::{UrlRecord, UrlStatus};

/// Capability set the probe pipeline requires from the URL store.
///
/// Implementations must be safe for concurrent use and cancellation-aware;
/// both calls are issued from short-lived probe tasks.
#[async_trait]
pub trait UrlRegistry: Send + Sync {
    /// Returns a snapshot of every registered URL across all tenants.
    async fn list_all(&self) -> Result<Vec<UrlRecord>, RegistryError>;

    /// Persists the observed status and probe completion time for one URL.
    ///
    /// `checked_at` must never move backwards for a record; implementations
    /// are expected to keep it monotonically non-decreasing.
    async fn update_status(
        &self,
        id: &str,
        status: UrlStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), RegistryError>;
}
