// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! signal-cli envelope normalization.
//!
//! signal-cli emits one JSON envelope per received item, either bare
//! (`{"envelope": {...}}`) or wrapped in a JSON-RPC `receive` notification
//! (`{"params": {"envelope": {...}}}`). A relay may also batch several of
//! either form into an array.

use chrono::{TimeZone, Utc};
use nexus_core::{
    Attachment, InboundEvent, MessageType, NexusError, ParsedWebhook, Platform, PlatformMessageId,
};
use serde_json::Value;

pub fn parse_envelopes(payload: &Value) -> Result<ParsedWebhook, NexusError> {
    let items: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![payload],
        _ => {
            return Err(NexusError::Normalization {
                platform: Platform::Signal,
                message: "payload is neither an envelope nor a list of envelopes".into(),
            });
        }
    };

    let mut parsed = ParsedWebhook::default();
    for item in items {
        let Some(envelope) = item
            .get("envelope")
            .or_else(|| item.pointer("/params/envelope"))
        else {
            parsed.skipped += 1;
            continue;
        };
        if envelope.get("receiptMessage").is_some() || envelope.get("typingMessage").is_some() {
            parsed.dropped += 1;
            continue;
        }
        let Some(data) = envelope.get("dataMessage") else {
            // sync, call and story messages
            parsed.dropped += 1;
            continue;
        };
        match parse_data_message(envelope, data) {
            Some(event) => parsed.events.push(event),
            None => parsed.skipped += 1,
        }
    }
    Ok(parsed)
}

fn parse_data_message(envelope: &Value, data: &Value) -> Option<InboundEvent> {
    let source = ["sourceNumber", "source", "sourceUuid"]
        .iter()
        .find_map(|k| envelope.get(*k).and_then(Value::as_str).filter(|s| !s.is_empty()))?
        .to_string();

    let text = data
        .get("message")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let attachments: Vec<Attachment> = data
        .get("attachments")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(attachment).collect())
        .unwrap_or_default();

    let (content, message_type) = match (text, attachments.first()) {
        (Some(text), None) => (text.to_string(), MessageType::Text),
        (text, Some(first)) => {
            let label = label_for(first.kind);
            let content = match text {
                Some(caption) => format!("[{label}] {caption}"),
                None => format!("[{label}] received"),
            };
            (content, first.kind)
        }
        (None, None) => return None,
    };

    let timestamp = data
        .get("timestamp")
        .or_else(|| envelope.get("timestamp"))
        .and_then(Value::as_i64);

    Some(InboundEvent {
        external_sender_id: source,
        sender_display_name: envelope
            .get("sourceName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from),
        content,
        message_type,
        raw_attachments: attachments,
        // Signal has no message ids; the sender timestamp identifies a message.
        platform_message_id: timestamp.map(|ts| PlatformMessageId(ts.to_string())),
        platform_timestamp: timestamp.and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
    })
}

fn attachment(v: &Value) -> Attachment {
    let s = |k: &str| v.get(k).and_then(Value::as_str).map(String::from);
    let mime = s("contentType");
    Attachment {
        kind: kind_for_mime(mime.as_deref().unwrap_or("")),
        file_id: s("id"),
        file_name: s("filename"),
        mime_type: mime,
        file_size: v.get("size").and_then(Value::as_u64),
        ..Default::default()
    }
}

fn kind_for_mime(mime: &str) -> MessageType {
    match mime.split('/').next().unwrap_or("") {
        "image" => MessageType::Image,
        "audio" => MessageType::Audio,
        "video" => MessageType::Video,
        _ => MessageType::File,
    }
}

fn label_for(kind: MessageType) -> &'static str {
    match kind {
        MessageType::Image => "Image",
        MessageType::Audio => "Audio",
        MessageType::Video => "Video",
        _ => "File",
    }
}
