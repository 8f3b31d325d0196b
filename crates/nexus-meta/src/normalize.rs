// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger-platform webhook normalization (Instagram and Facebook).
//!
//! Both platforms deliver `{"object": ..., "entry": [{"messaging": [...]}]}`.
//! Postbacks, read and delivery receipts, reactions and echoes of our own
//! sends are recognized and dropped.

use chrono::{DateTime, TimeZone, Utc};
use nexus_core::{
    Attachment, InboundEvent, MessageType, NexusError, ParsedWebhook, Platform, PlatformMessageId,
};
use serde_json::Value;
use tracing::debug;

const NON_MESSAGE_KEYS: &[&str] = &[
    "postback",
    "read",
    "delivery",
    "reaction",
    "optin",
    "referral",
    "account_linking",
];

pub fn parse_messaging(platform: Platform, payload: &Value) -> Result<ParsedWebhook, NexusError> {
    let entries = payload
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| NexusError::Normalization {
            platform,
            message: "payload has no entry array".into(),
        })?;

    let mut parsed = ParsedWebhook::default();
    for entry in entries {
        let Some(items) = entry.get("messaging").and_then(Value::as_array) else {
            // Feed or comment changes arrive under `changes`; not messages.
            parsed.dropped += 1;
            continue;
        };
        for item in items {
            match parse_item(item) {
                Item::Event(event) => parsed.events.push(*event),
                Item::Dropped(kind) => {
                    debug!(%platform, kind, "dropping non-message webhook item");
                    parsed.dropped += 1;
                }
                Item::Malformed(reason) => {
                    debug!(%platform, reason, "skipping malformed webhook item");
                    parsed.skipped += 1;
                }
            }
        }
    }
    Ok(parsed)
}

enum Item {
    Event(Box<InboundEvent>),
    Dropped(&'static str),
    Malformed(&'static str),
}

fn parse_item(item: &Value) -> Item {
    if !item.is_object() {
        return Item::Malformed("item is not an object");
    }
    let Some(message) = item.get("message") else {
        let kind = NON_MESSAGE_KEYS
            .iter()
            .find(|k| item.get(**k).is_some())
            .copied()
            .unwrap_or("unknown");
        return Item::Dropped(kind);
    };
    if message.get("is_echo").and_then(Value::as_bool) == Some(true) {
        return Item::Dropped("echo");
    }
    let Some(sender) = item.pointer("/sender/id").and_then(id_string) else {
        return Item::Malformed("missing sender.id");
    };

    let (content, message_type, attachments) = match message.get("text").and_then(Value::as_str) {
        Some(text) => (text.to_string(), MessageType::Text, Vec::new()),
        None => match message.get("attachments").and_then(Value::as_array) {
            Some(list) if !list.is_empty() => attachment_content(list),
            _ => return Item::Malformed("message has neither text nor attachments"),
        },
    };

    Item::Event(Box::new(InboundEvent {
        external_sender_id: sender,
        sender_display_name: None,
        content,
        message_type,
        raw_attachments: attachments,
        platform_message_id: message
            .get("mid")
            .and_then(Value::as_str)
            .map(|m| PlatformMessageId(m.to_string())),
        platform_timestamp: item.get("timestamp").and_then(Value::as_i64).and_then(millis),
    }))
}

fn attachment_content(list: &[Value]) -> (String, MessageType, Vec<Attachment>) {
    let attachments: Vec<Attachment> = list
        .iter()
        .map(|a| {
            let kind = a.get("type").and_then(Value::as_str).unwrap_or("file");
            Attachment {
                kind: attachment_kind(kind),
                url: a.pointer("/payload/url").and_then(Value::as_str).map(String::from),
                ..Default::default()
            }
        })
        .collect();

    let first = list[0].get("type").and_then(Value::as_str).unwrap_or("file");
    let content = match first {
        "image" => "[Image] received".to_string(),
        "video" => "[Video] received".to_string(),
        "audio" => "[Audio] received".to_string(),
        "file" => "[File] received".to_string(),
        "location" => "[Location] received".to_string(),
        other => format!("[{}] Unsupported attachment", capitalize(other)),
    };
    (content, attachment_kind(first), attachments)
}

fn attachment_kind(kind: &str) -> MessageType {
    match kind {
        "image" => MessageType::Image,
        "video" => MessageType::Video,
        "audio" => MessageType::Audio,
        "location" => MessageType::Location,
        "file" => MessageType::File,
        _ => MessageType::Text,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => "Attachment".to_string(),
    }
}

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
