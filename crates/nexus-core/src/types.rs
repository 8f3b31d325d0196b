// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by adapters, storage and the routing engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Identifier of a tenant (company); the unit of data isolation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Message identifier assigned by the external platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformMessageId(pub String);

/// Opaque handle of a room in the internal workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomHandle(pub String);

/// Identifier of an event posted into a workspace room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceEventId(pub String);

impl fmt::Display for RoomHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for WorkspaceEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of external messaging platforms.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    AsRefStr,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    WhatsApp,
    Telegram,
    Instagram,
    Facebook,
    Signal,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::WhatsApp,
        Platform::Telegram,
        Platform::Instagram,
        Platform::Facebook,
        Platform::Signal,
    ];

    /// Credential fields that must be present before a bridge can be configured.
    pub fn required_credentials(self) -> &'static [&'static str] {
        match self {
            Platform::WhatsApp => &[
                "access_token",
                "phone_number_id",
                "business_account_id",
                "webhook_verify_token",
            ],
            Platform::Telegram => &["bot_token", "bot_username"],
            Platform::Instagram => &["access_token", "page_id", "app_secret"],
            Platform::Facebook => &["page_access_token", "page_id", "app_secret"],
            Platform::Signal => &["phone_number"],
        }
    }

    /// Credential fields accepted but not required.
    pub fn optional_credentials(self) -> &'static [&'static str] {
        match self {
            Platform::WhatsApp | Platform::Telegram => &[],
            Platform::Instagram | Platform::Facebook => &["webhook_verify_token"],
            Platform::Signal => &["signal_cli_path", "account_data"],
        }
    }

    /// Non-secret identifiers copied out of the credential map onto the
    /// bridge row so routing can use them without decrypting.
    pub fn public_identifier_fields(self) -> &'static [&'static str] {
        match self {
            Platform::WhatsApp => &["phone_number_id", "business_account_id"],
            Platform::Telegram => &["bot_username"],
            Platform::Instagram | Platform::Facebook => &["page_id"],
            Platform::Signal => &["phone_number"],
        }
    }

    /// Whether the platform performs a GET `hub.challenge` handshake.
    pub fn requires_verification_handshake(self) -> bool {
        matches!(
            self,
            Platform::WhatsApp | Platform::Instagram | Platform::Facebook
        )
    }

    /// Upper-case label used in workspace summaries.
    pub fn label(self) -> String {
        self.to_string().to_uppercase()
    }
}

/// Lifecycle status of a bridge configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BridgeStatus {
    Pending,
    Configuring,
    Configured,
    Active,
    Error,
    Inactive,
}

impl BridgeStatus {
    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: BridgeStatus) -> bool {
        use BridgeStatus::*;
        match (self, next) {
            (Active, Configuring) | (Active, Configured) | (Active, Pending) => false,
            (_, Configuring) => true,
            (Pending | Configuring | Configured | Error, Configured) => true,
            (Configured | Inactive | Error, Active) => true,
            (Pending | Configuring | Configured | Active | Error, Error) => true,
            (Active | Configured | Error, Inactive) => true,
            _ => false,
        }
    }

    /// Inbound webhooks are accepted in every state except `inactive`.
    pub fn accepts_inbound(self) -> bool {
        self != BridgeStatus::Inactive
    }
}

/// Tenant-neutral message type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
    Audio,
    Video,
    Location,
    Contact,
}

/// Direction of a stored message relative to the tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Archived,
    Escalated,
}

/// Media or structured payload attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// Canonical representation of one incoming platform message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub external_sender_id: String,
    pub sender_display_name: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub raw_attachments: Vec<Attachment>,
    pub platform_message_id: Option<PlatformMessageId>,
    pub platform_timestamp: Option<DateTime<Utc>>,
}

/// Output of a webhook normalizer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedWebhook {
    /// Events in payload order.
    pub events: Vec<InboundEvent>,
    /// Recognized but unsupported items (receipts, postbacks, callbacks).
    pub dropped: usize,
    /// Individual items that were malformed and skipped.
    pub skipped: usize,
}

impl ParsedWebhook {
    /// Label stored on the webhook event row.
    pub fn event_type(&self) -> &'static str {
        if !self.events.is_empty() {
            "message"
        } else if self.dropped > 0 {
            "status"
        } else {
            "unknown"
        }
    }
}

/// Result of an adapter's lightweight authenticated probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTest {
    pub ok: bool,
    pub diagnostic: String,
}

impl ConnectionTest {
    pub fn ok(diagnostic: impl Into<String>) -> Self {
        Self {
            ok: true,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            ok: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Tenant settings supplied by the account collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantProfile {
    pub id: TenantId,
    pub name: String,
    pub industry: Option<String>,
    pub ai_enabled: bool,
    pub auto_respond: bool,
    pub confidence_threshold: f64,
    pub escalation_keywords: Vec<String>,
    pub system_prompt: Option<String>,
}

impl TenantProfile {
    pub fn new(id: impl Into<TenantId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            industry: None,
            ai_enabled: true,
            auto_respond: false,
            confidence_threshold: 0.8,
            escalation_keywords: Vec::new(),
            system_prompt: None,
        }
    }
}

/// AI suggestion attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnnotation {
    pub text: Option<String>,
    pub confidence: f64,
    pub intent: Option<String>,
    pub escalate: bool,
    pub action: String,
}
