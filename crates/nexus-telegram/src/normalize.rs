// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram update normalization.
//!
//! One update carries at most one message, under `message` or
//! `edited_message`. The chat id is the external identity, so replies go
//! back to the same chat. Callback queries, membership changes and other
//! update kinds are dropped.

use chrono::{TimeZone, Utc};
use nexus_core::{
    Attachment, InboundEvent, MessageType, NexusError, ParsedWebhook, Platform, PlatformMessageId,
};
use serde_json::Value;

pub fn parse_update(payload: &Value) -> Result<ParsedWebhook, NexusError> {
    let update = payload.as_object().ok_or_else(|| NexusError::Normalization {
        platform: Platform::Telegram,
        message: "update is not a JSON object".into(),
    })?;

    let mut parsed = ParsedWebhook::default();
    let Some(message) = update.get("message").or_else(|| update.get("edited_message")) else {
        parsed.dropped = 1;
        return Ok(parsed);
    };
    match parse_message(message) {
        Some(event) => parsed.events.push(event),
        None => parsed.skipped = 1,
    }
    Ok(parsed)
}

fn parse_message(message: &Value) -> Option<InboundEvent> {
    let chat_id = match message.pointer("/chat/id")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) if !s.is_empty() => s.clone(),
        _ => return None,
    };
    let (content, message_type, attachments) = content_for(message);

    Some(InboundEvent {
        external_sender_id: chat_id,
        sender_display_name: sender_name(message),
        content,
        message_type,
        raw_attachments: attachments,
        platform_message_id: message
            .get("message_id")
            .and_then(Value::as_i64)
            .map(|id| PlatformMessageId(id.to_string())),
        platform_timestamp: message
            .get("date")
            .and_then(Value::as_i64)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    })
}

fn sender_name(message: &Value) -> Option<String> {
    let from = message.get("from")?;
    let first = from.get("first_name").and_then(Value::as_str).unwrap_or("");
    let last = from.get("last_name").and_then(Value::as_str).unwrap_or("");
    let name = format!("{first} {last}").trim().to_string();
    if name.is_empty() {
        from.get("username").and_then(Value::as_str).map(String::from)
    } else {
        Some(name)
    }
}

fn file(kind: MessageType, v: &Value) -> Attachment {
    let s = |k: &str| v.get(k).and_then(Value::as_str).map(String::from);
    Attachment {
        kind,
        file_id: s("file_id"),
        file_name: s("file_name"),
        mime_type: s("mime_type"),
        file_size: v.get("file_size").and_then(Value::as_u64),
        ..Default::default()
    }
}

fn content_for(message: &Value) -> (String, MessageType, Vec<Attachment>) {
    let caption = message.get("caption").and_then(Value::as_str);
    let or_caption = |fallback: &str| caption.unwrap_or(fallback).to_string();

    if let Some(text) = message.get("text").and_then(Value::as_str) {
        return (text.to_string(), MessageType::Text, Vec::new());
    }
    if let Some(photos) = message.get("photo").and_then(Value::as_array) {
        let largest = photos
            .iter()
            .max_by_key(|p| p.get("file_size").and_then(Value::as_u64).unwrap_or(0));
        let attachments = largest.map(|p| vec![file(MessageType::Image, p)]).unwrap_or_default();
        return (or_caption("Photo received"), MessageType::Image, attachments);
    }
    if let Some(doc) = message.get("document") {
        let name = doc.get("file_name").and_then(Value::as_str).unwrap_or("Document");
        let content = caption.map(String::from).unwrap_or_else(|| format!("[Document] {name}"));
        return (content, MessageType::File, vec![file(MessageType::File, doc)]);
    }
    if let Some(audio) = message.get("voice").or_else(|| message.get("audio")) {
        return (
            or_caption("[Audio message received]"),
            MessageType::Audio,
            vec![file(MessageType::Audio, audio)],
        );
    }
    if let Some(video) = message.get("video") {
        return (
            or_caption("Video received"),
            MessageType::Video,
            vec![file(MessageType::Video, video)],
        );
    }
    if let Some(location) = message.get("location") {
        let lat = location.get("latitude").and_then(Value::as_f64).unwrap_or_default();
        let lng = location.get("longitude").and_then(Value::as_f64).unwrap_or_default();
        return (format!("[Location] {lat},{lng}"), MessageType::Location, Vec::new());
    }
    if let Some(contact) = message.get("contact") {
        let name = contact.get("first_name").and_then(Value::as_str).unwrap_or("Contact");
        let phone = contact.get("phone_number").and_then(Value::as_str).unwrap_or("");
        let content = format!("[Contact] {name} {phone}").trim_end().to_string();
        return (content, MessageType::Contact, Vec::new());
    }

    let kind = ["sticker", "animation", "video_note", "poll", "dice", "venue"]
        .into_iter()
        .find(|k| message.get(*k).is_some())
        .unwrap_or("message");
    (
        format!("[{}] Unsupported message type", capitalize(kind)),
        MessageType::Text,
        Vec::new(),
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
