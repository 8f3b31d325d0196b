// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::NexusError;
use crate::types::{Platform, RoomHandle, TenantId, WorkspaceEventId};

/// The internal federated workspace, used purely as a forwarding sink.
#[async_trait]
pub trait WorkspaceSink: Send + Sync + 'static {
    /// Links a tenant's platform bridge to the workspace and returns the
    /// bridge's control room. Only public identifiers are passed along.
    async fn initialize_tenant_bridge(
        &self,
        tenant: &TenantId,
        platform: Platform,
        public_ids: &BTreeMap<String, String>,
    ) -> Result<RoomHandle, NexusError>;

    async fn send_to_room(
        &self,
        room: &RoomHandle,
        text: &str,
    ) -> Result<WorkspaceEventId, NexusError>;

    /// Returns the room mirroring one external participant's conversation.
    async fn get_or_create_room(
        &self,
        tenant: &TenantId,
        platform: Platform,
        external_id: &str,
    ) -> Result<RoomHandle, NexusError>;
}
