// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all platform adapters implement.

use async_trait::async_trait;

use crate::error::NexusError;

/// Identity and lifecycle shared by every cached adapter.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Short name of the adapter implementation, used in logs.
    fn name(&self) -> &str;

    /// Releases any held resources. Called when the registry evicts the adapter.
    async fn shutdown(&self) -> Result<(), NexusError>;
}
