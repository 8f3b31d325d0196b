// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform adapter trait for external messaging platforms.

use async_trait::async_trait;

use crate::error::NexusError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConnectionTest, MessageType, ParsedWebhook, Platform, PlatformMessageId};

/// Send, parse and probe operations for one tenant's platform account.
///
/// Instances are built from decrypted credentials and cached by the adapter
/// registry per `(tenant, platform)`.
#[async_trait]
pub trait PlatformAdapter: PluginAdapter {
    fn platform(&self) -> Platform;

    /// Delivers `content` to `recipient` in the platform's wire format.
    ///
    /// Failures are classified as [`NexusError::Auth`],
    /// [`NexusError::Transient`] or [`NexusError::Permanent`].
    async fn send_message(
        &self,
        recipient: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<PlatformMessageId, NexusError>;

    /// Normalizes a raw webhook payload. Pure and deterministic.
    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<ParsedWebhook, NexusError>;

    /// One lightweight authenticated call, bounded by the adapter's timeout.
    async fn test_connection(&self) -> ConnectionTest;
}
