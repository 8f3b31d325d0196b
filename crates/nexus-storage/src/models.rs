// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for persisted bridge state.
//!
//! Timestamps are stored as RFC 3339 text with millisecond precision, except
//! `messages.timestamp_ms` which is an integer so ordering stays exact.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use nexus_core::{
    AiAnnotation, Attachment, BridgeStatus, ConversationStatus, Direction, MessageType, Platform,
    PlatformMessageId, RoomHandle, TenantId,
};
use serde::Serialize;

/// Platform timestamps further than this past arrival are treated as bogus.
pub const MAX_FUTURE_SKEW_SECS: i64 = 600;

/// One (tenant, platform) bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeRecord {
    pub id: String,
    pub tenant_id: TenantId,
    pub platform: Platform,
    pub status: BridgeStatus,
    #[serde(skip)]
    pub credentials: Option<Vec<u8>>,
    pub encryption_version: Option<String>,
    pub public_ids: BTreeMap<String, String>,
    pub room_handle: Option<RoomHandle>,
    pub webhook_path: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub setup_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BridgeRecord {
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

/// Webhook path for a bridge, relative to the gateway root.
pub fn webhook_path(platform: Platform, tenant: &TenantId) -> String {
    format!("/api/webhooks/{platform}/{tenant}")
}

/// A raw inbound payload as received.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookEventRecord {
    pub id: i64,
    pub bridge_id: String,
    pub tenant_id: TenantId,
    pub platform: Platform,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub retry_count: u32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub id: String,
    pub tenant_id: TenantId,
    pub external_id: String,
    pub platform: Platform,
    pub participant_name: Option<String>,
    pub participant_metadata: serde_json::Value,
    pub status: ConversationStatus,
    pub assigned_agent: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Who a conversation is with, as far as the platform tells us.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Participant {
    pub display_name: Option<String>,
    pub metadata: serde_json::Value,
}

impl Participant {
    pub fn named(name: Option<String>) -> Self {
        Self {
            display_name: name,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }
}

/// A stored message. Immutable apart from `is_processed` and `ai_annotation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub seq: i64,
    pub conversation_id: String,
    pub direction: Direction,
    pub message_type: MessageType,
    pub content: String,
    pub sender: serde_json::Value,
    pub attachments: Vec<Attachment>,
    pub metadata: serde_json::Value,
    pub platform_message_id: Option<PlatformMessageId>,
    pub webhook_event_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub is_processed: bool,
    pub ai_annotation: Option<AiAnnotation>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Position of this message in the conversation's total order.
    pub fn cursor(&self) -> MessageCursor {
        MessageCursor {
            timestamp_ms: self.timestamp.timestamp_millis(),
            seq: self.seq,
        }
    }
}

/// Input to [`crate::queries::messages::append_message`].
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: String,
    pub direction: Direction,
    pub message_type: MessageType,
    pub content: String,
    pub sender: serde_json::Value,
    pub attachments: Vec<Attachment>,
    pub metadata: serde_json::Value,
    pub platform_message_id: Option<PlatformMessageId>,
    pub webhook_event_id: Option<i64>,
    pub platform_timestamp: Option<DateTime<Utc>>,
    pub is_processed: bool,
}

impl NewMessage {
    pub fn new(
        conversation_id: impl Into<String>,
        direction: Direction,
        message_type: MessageType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            direction,
            message_type,
            content: content.into(),
            sender: serde_json::Value::Object(Default::default()),
            attachments: Vec::new(),
            metadata: serde_json::Value::Object(Default::default()),
            platform_message_id: None,
            webhook_event_id: None,
            platform_timestamp: None,
            is_processed: false,
        }
    }
}

/// Result of appending a message.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Inserted(Message),
    /// An inbound message with the same platform id already exists.
    Duplicate(Message),
}

impl AppendOutcome {
    pub fn message(&self) -> &Message {
        match self {
            Self::Inserted(m) | Self::Duplicate(m) => m,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Self::Inserted(m) | Self::Duplicate(m) => m,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Read direction for message listings. Always explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrder {
    OldestFirst,
    NewestFirst,
}

/// Exclusive upper bound for paging, as `(timestamp, seq)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MessageCursor {
    pub timestamp_ms: i64,
    pub seq: i64,
}

/// Picks the ordering timestamp for a new message.
///
/// Uses the platform timestamp unless it is missing, not after the unix
/// epoch, or more than [`MAX_FUTURE_SKEW_SECS`] past `arrival`.
pub fn resolve_timestamp(
    platform_timestamp: Option<DateTime<Utc>>,
    arrival: DateTime<Utc>,
) -> DateTime<Utc> {
    let latest = arrival + Duration::seconds(MAX_FUTURE_SKEW_SECS);
    match platform_timestamp {
        Some(ts) if ts.timestamp_millis() > 0 && ts <= latest => ts,
        _ => arrival,
    }
}

pub(crate) fn fmt_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn now() -> String {
    fmt_time(&Utc::now())
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

pub(crate) fn parse_time(idx: usize, raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_opt_time(
    idx: usize,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    raw.map(|r| parse_time(idx, &r)).transpose()
}

pub(crate) fn parse_millis(idx: usize, ms: i64) -> Result<DateTime<Utc>, rusqlite::Error> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

pub(crate) fn parse_enum<T: std::str::FromStr>(idx: usize, raw: &str) -> Result<T, rusqlite::Error>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> Result<T, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, rusqlite::Error> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_timestamp_is_kept_when_plausible() {
        let arrival = Utc::now();
        let ts = arrival - Duration::seconds(30);
        assert_eq!(resolve_timestamp(Some(ts), arrival), ts);
    }

    #[test]
    fn implausible_timestamps_fall_back_to_arrival() {
        let arrival = Utc::now();
        let epoch = Utc.timestamp_millis_opt(0).unwrap();
        let before_epoch = Utc.timestamp_millis_opt(-5_000).unwrap();
        let far_future = arrival + Duration::hours(2);

        assert_eq!(resolve_timestamp(None, arrival), arrival);
        assert_eq!(resolve_timestamp(Some(epoch), arrival), arrival);
        assert_eq!(resolve_timestamp(Some(before_epoch), arrival), arrival);
        assert_eq!(resolve_timestamp(Some(far_future), arrival), arrival);
    }

    #[test]
    fn small_clock_skew_is_tolerated() {
        let arrival = Utc::now();
        let ahead = arrival + Duration::minutes(2);
        assert_eq!(resolve_timestamp(Some(ahead), arrival), ahead);
    }

    #[test]
    fn webhook_path_is_platform_then_tenant() {
        assert_eq!(
            webhook_path(Platform::WhatsApp, &TenantId::from("acme")),
            "/api/webhooks/whatsapp/acme"
        );
    }

    #[test]
    fn cursors_order_by_timestamp_then_seq() {
        let a = MessageCursor { timestamp_ms: 10, seq: 5 };
        let b = MessageCursor { timestamp_ms: 10, seq: 6 };
        let c = MessageCursor { timestamp_ms: 11, seq: 1 };
        assert!(a < b && b < c);
    }

    #[test]
    fn stored_times_round_trip_at_millisecond_precision() {
        let t = Utc.timestamp_millis_opt(1_767_225_600_123).unwrap();
        let s = fmt_time(&t);
        assert!(s.ends_with(".123Z"));
        assert_eq!(parse_time(0, &s).unwrap(), t);
    }
}
