// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use crate::credentials::Credentials;
use crate::error::NexusError;
use crate::traits::platform::PlatformAdapter;
use crate::types::{ParsedWebhook, Platform, TenantId};

/// Builds platform adapters from decrypted credentials.
///
/// Implementations match exhaustively on [`Platform`], so adding a platform
/// is a compile-checked change.
pub trait AdapterFactory: Send + Sync + 'static {
    fn build(
        &self,
        tenant: &TenantId,
        platform: Platform,
        credentials: &Credentials,
    ) -> Result<Arc<dyn PlatformAdapter>, NexusError>;

    /// Runs the platform's stateless webhook normalizer without credentials.
    fn parse_webhook(
        &self,
        platform: Platform,
        payload: &serde_json::Value,
    ) -> Result<ParsedWebhook, NexusError>;
}
