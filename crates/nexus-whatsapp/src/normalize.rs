// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud API webhook normalization.
//!
//! Messages are batched under `entry[].changes[].value.messages[]`; sender
//! names live next to them in `value.contacts[]`. Delivery and read
//! receipts arrive as `value.statuses[]` and are dropped.

use chrono::{DateTime, TimeZone, Utc};
use nexus_core::{
    Attachment, InboundEvent, MessageType, NexusError, ParsedWebhook, Platform, PlatformMessageId,
};
use serde_json::Value;
use tracing::debug;

pub fn parse_webhook(payload: &Value) -> Result<ParsedWebhook, NexusError> {
    let entries = payload
        .get("entry")
        .and_then(Value::as_array)
        .ok_or_else(|| NexusError::Normalization {
            platform: Platform::WhatsApp,
            message: "payload has no entry array".into(),
        })?;

    let mut parsed = ParsedWebhook::default();
    for change in entries
        .iter()
        .filter_map(|e| e.get("changes").and_then(Value::as_array))
        .flatten()
    {
        let Some(value) = change.get("value") else {
            parsed.skipped += 1;
            continue;
        };
        if let Some(statuses) = value.get("statuses").and_then(Value::as_array) {
            parsed.dropped += statuses.len();
        }
        let Some(messages) = value.get("messages").and_then(Value::as_array) else {
            continue;
        };
        let contacts = value
            .get("contacts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for message in messages {
            match parse_message(message, contacts) {
                Some(event) => parsed.events.push(event),
                None => {
                    debug!("skipping malformed whatsapp message");
                    parsed.skipped += 1;
                }
            }
        }
    }
    Ok(parsed)
}

fn parse_message(message: &Value, contacts: &[Value]) -> Option<InboundEvent> {
    let from = message.get("from").and_then(Value::as_str)?.to_string();
    let kind = message.get("type").and_then(Value::as_str).unwrap_or("text");
    let (content, message_type, attachments) = content_for(kind, message)?;

    Some(InboundEvent {
        sender_display_name: display_name(&from, contacts),
        external_sender_id: from,
        content,
        message_type,
        raw_attachments: attachments,
        platform_message_id: message
            .get("id")
            .and_then(Value::as_str)
            .map(|id| PlatformMessageId(id.to_string())),
        platform_timestamp: message.get("timestamp").and_then(unix_seconds),
    })
}

fn content_for(kind: &str, message: &Value) -> Option<(String, MessageType, Vec<Attachment>)> {
    let body = message.get(kind);
    let field = |name: &str| body.and_then(|b| b.get(name)).and_then(Value::as_str);
    let media = |kind: MessageType| Attachment {
        kind,
        file_id: field("id").map(String::from),
        file_name: field("filename").map(String::from),
        mime_type: field("mime_type").map(String::from),
        ..Default::default()
    };

    let result = match kind {
        "text" => (field("body")?.to_string(), MessageType::Text, Vec::new()),
        "image" => (
            format!("[Image] {}", field("caption").unwrap_or("Image received")),
            MessageType::Image,
            vec![media(MessageType::Image)],
        ),
        "document" => (
            format!("[Document] {}", field("filename").unwrap_or("Document")),
            MessageType::File,
            vec![media(MessageType::File)],
        ),
        "audio" | "voice" => (
            "[Audio message received]".to_string(),
            MessageType::Audio,
            vec![media(MessageType::Audio)],
        ),
        "video" => (
            format!("[Video] {}", field("caption").unwrap_or("Video received")),
            MessageType::Video,
            vec![media(MessageType::Video)],
        ),
        "location" => {
            let lat = body.and_then(|b| b.get("latitude")).and_then(Value::as_f64);
            let lng = body.and_then(|b| b.get("longitude")).and_then(Value::as_f64);
            let content = match (lat, lng) {
                (Some(lat), Some(lng)) => format!("[Location] {lat},{lng}"),
                _ => "[Location] unknown".to_string(),
            };
            (content, MessageType::Location, Vec::new())
        }
        "contacts" => {
            let name = message
                .pointer("/contacts/0/name/formatted_name")
                .and_then(Value::as_str)
                .unwrap_or("Contact");
            (format!("[Contact] {name}"), MessageType::Contact, Vec::new())
        }
        other => (
            format!("[{}] Unsupported message type", capitalize(other)),
            MessageType::Text,
            Vec::new(),
        ),
    };
    Some(result)
}

fn display_name(wa_id: &str, contacts: &[Value]) -> Option<String> {
    let name_of = |c: &Value| {
        c.pointer("/profile/name")
            .and_then(Value::as_str)
            .map(String::from)
    };
    contacts
        .iter()
        .find(|c| c.get("wa_id").and_then(Value::as_str) == Some(wa_id))
        .and_then(name_of)
        .or_else(|| contacts.first().and_then(name_of))
}

fn unix_seconds(v: &Value) -> Option<DateTime<Utc>> {
    let secs = match v {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    Utc.timestamp_opt(secs, 0).single()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => "Unknown".to_string(),
    }
}
