// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Business Cloud API adapter.
//!
//! Sends through `POST /{phone_number_id}/messages` on the Graph API and
//! normalizes Cloud API webhooks (see [`normalize`]).

pub mod normalize;

use async_trait::async_trait;
use nexus_config::model::PlatformsConfig;
use nexus_core::{
    ConnectionTest, Credentials, MessageType, NexusError, ParsedWebhook, Platform,
    PlatformAdapter, PlatformMessageId, PluginAdapter,
};
use nexus_meta::graph::GraphClient;
use serde_json::json;
use tracing::debug;

#[derive(Debug)]
pub struct WhatsAppAdapter {
    phone_number_id: String,
    graph: GraphClient,
}

impl WhatsAppAdapter {
    pub fn new(credentials: &Credentials, config: &PlatformsConfig) -> Result<Self, NexusError> {
        let token = credentials.require("access_token")?;
        let phone_number_id = credentials.require("phone_number_id")?.to_string();
        Ok(Self {
            phone_number_id,
            graph: GraphClient::new(config, Platform::WhatsApp, token)?,
        })
    }
}

/// Normalizes a recipient to the bare digits the Cloud API expects.
pub fn normalize_recipient(recipient: &str) -> Result<String, NexusError> {
    let digits = recipient.trim().trim_start_matches('+');
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(NexusError::permanent(format!(
            "invalid WhatsApp recipient `{recipient}`"
        )));
    }
    Ok(digits.to_string())
}

#[async_trait]
impl PluginAdapter for WhatsAppAdapter {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn shutdown(&self) -> Result<(), NexusError> {
        debug!(phone_number_id = %self.phone_number_id, "whatsapp adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for WhatsAppAdapter {
    fn platform(&self) -> Platform {
        Platform::WhatsApp
    }

    async fn send_message(
        &self,
        recipient: &str,
        content: &str,
        _message_type: MessageType,
    ) -> Result<PlatformMessageId, NexusError> {
        let to = normalize_recipient(recipient)?;
        let body = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": {"body": content},
        });
        let response = self
            .graph
            .post(&format!("{}/messages", self.phone_number_id), &body)
            .await?;
        response
            .pointer("/messages/0/id")
            .and_then(|v| v.as_str())
            .map(|id| PlatformMessageId(id.to_string()))
            .ok_or_else(|| NexusError::Internal("send response has no messages[0].id".into()))
    }

    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<ParsedWebhook, NexusError> {
        normalize::parse_webhook(payload)
    }

    async fn test_connection(&self) -> ConnectionTest {
        match self.graph.get(&self.phone_number_id).await {
            Ok(info) => {
                let number = info
                    .get("display_phone_number")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&self.phone_number_id);
                ConnectionTest::ok(format!("phone number {number} reachable"))
            }
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }
}
