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

//! In-memory URL registry.
//!
//! Reference implementation of [`UrlRegistry`] used by the test suite and
//! local development. Registration validates addresses and enforces the
//! per-tenant uniqueness invariant the relational implementations enforce
//! with a unique index.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::UrlRegistry;
use crate::error::RegistryError;
use crate::models::{UrlRecord, UrlStatus};

/// Thread-safe in-memory [`UrlRegistry`].
#[derive(Debug, Default)]
pub struct MemoryUrlRegistry {
    records: Mutex<Vec<UrlRecord>>,
}

impl MemoryUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a URL for a tenant.
    ///
    /// The address must parse as an absolute `http` or `https` URL and must
    /// not already be registered for the tenant. New records start in
    /// [`UrlStatus::Unknown`] with no `checked_at`.
    pub fn register(&self, tenant_id: &str, address: &str) -> Result<UrlRecord, RegistryError> {
        let parsed = Url::parse(address).map_err(|e| RegistryError::InvalidAddress {
            address: address.to_string(),
            message: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RegistryError::InvalidAddress {
                address: address.to_string(),
                message: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let mut records = self.records.lock();
        if records
            .iter()
            .any(|record| record.tenant_id == tenant_id && record.address == address)
        {
            return Err(RegistryError::Conflict {
                address: address.to_string(),
            });
        }

        let record = UrlRecord {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            address: address.to_string(),
            status: UrlStatus::Unknown,
            checked_at: None,
        };
        records.push(record.clone());
        debug!(id = %record.id, tenant = tenant_id, address, "URL registered");
        Ok(record)
    }

    /// Returns a record by id, if present.
    pub fn get(&self, id: &str) -> Option<UrlRecord> {
        self.records.lock().iter().find(|r| r.id == id).cloned()
    }
}

#[async_trait::async_trait]
impl UrlRegistry for MemoryUrlRegistry {
    async fn list_all(&self) -> Result<Vec<UrlRecord>, RegistryError> {
        Ok(self.records.lock().clone())
    }

    async fn update_status(
        &self,
        id: &str,
        status: UrlStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let mut records = self.records.lock();
        let record = records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })?;

        record.status = status;
        // checked_at is monotone per record
        record.checked_at = Some(match record.checked_at {
            Some(previous) if previous > checked_at => previous,
            _ => checked_at,
        });
        Ok(())
    }
}
