// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::NexusError;
use crate::types::{TenantId, TenantProfile};

/// Read-only view of tenant settings owned by the account service.
#[async_trait]
pub trait TenantDirectory: Send + Sync + 'static {
    /// Returns `None` for unknown tenants.
    async fn tenant(&self, id: &TenantId) -> Result<Option<TenantProfile>, NexusError>;
}
