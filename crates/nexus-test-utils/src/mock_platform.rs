// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform adapter and factory for deterministic testing.
//!
//! Every adapter the factory builds shares one [`MockPlatformState`], so a
//! test can script failures and inspect sent messages no matter how often
//! the registry rebuilds the adapter.
//!
//! Webhooks use a small mock wire format built by [`inbound_payload`]:
//!
//! ```json
//! {"messages": [{"from": "u1", "name": "Dana", "text": "hi", "id": "m1", "timestamp": 1700000000000}]}
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use nexus_core::{
    AdapterFactory, ConnectionTest, Credentials, InboundEvent, MessageType, NexusError,
    ParsedWebhook, Platform, PlatformAdapter, PlatformMessageId, PluginAdapter, TenantId,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;

/// A message captured by [`MockPlatformAdapter::send_message`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub tenant: TenantId,
    pub platform: Platform,
    pub recipient: String,
    pub content: String,
    pub message_type: MessageType,
}

/// Scripted outcome for the next send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// Credentials rejected.
    Auth,
    /// 5xx-style failure.
    Transient,
    /// The process or request ran past its deadline.
    Timeout,
    /// Bad recipient.
    Permanent,
}

impl SendFailure {
    fn into_error(self, platform: Platform) -> NexusError {
        match self {
            Self::Auth => NexusError::auth(platform, "mock platform rejected the access token"),
            Self::Transient => NexusError::transient("mock platform returned 503"),
            Self::Timeout => NexusError::transient(format!("{platform} send timed out after 10s")),
            Self::Permanent => NexusError::permanent("mock platform rejected the recipient"),
        }
    }
}

/// State shared by every adapter a [`MockAdapterFactory`] builds.
pub struct MockPlatformState {
    sent: Mutex<Vec<SentMessage>>,
    failures: Mutex<VecDeque<SendFailure>>,
    connection_ok: AtomicBool,
    test_delay: Mutex<Option<Duration>>,
    builds: AtomicUsize,
    connection_tests: AtomicUsize,
    shutdowns: AtomicUsize,
    next_id: AtomicUsize,
}

impl MockPlatformState {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            connection_ok: AtomicBool::new(true),
            test_delay: Mutex::new(None),
            builds: AtomicUsize::new(0),
            connection_tests: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Queues failures consumed by the next sends, in order.
    pub async fn fail_next_sends(&self, failures: impl IntoIterator<Item = SendFailure>) {
        self.failures.lock().await.extend(failures);
    }

    pub fn set_connection_ok(&self, ok: bool) {
        self.connection_ok.store(ok, Ordering::SeqCst);
    }

    /// Makes `test_connection` sleep before answering.
    pub async fn set_test_delay(&self, delay: Option<Duration>) {
        *self.test_delay.lock().await = delay;
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn connection_tests(&self) -> usize {
        self.connection_tests.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

/// A mock platform adapter bound to one bridge.
pub struct MockPlatformAdapter {
    tenant: TenantId,
    platform: Platform,
    state: Arc<MockPlatformState>,
}

#[async_trait]
impl PluginAdapter for MockPlatformAdapter {
    fn name(&self) -> &str {
        "mock-platform"
    }

    async fn shutdown(&self) -> Result<(), NexusError> {
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for MockPlatformAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn send_message(
        &self,
        recipient: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<PlatformMessageId, NexusError> {
        if let Some(failure) = self.state.failures.lock().await.pop_front() {
            return Err(failure.into_error(self.platform));
        }
        self.state.sent.lock().await.push(SentMessage {
            tenant: self.tenant.clone(),
            platform: self.platform,
            recipient: recipient.to_string(),
            content: content.to_string(),
            message_type,
        });
        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(PlatformMessageId(format!("mock-out-{n}")))
    }

    fn parse_webhook(&self, payload: &Value) -> Result<ParsedWebhook, NexusError> {
        parse_mock_payload(self.platform, payload)
    }

    async fn test_connection(&self) -> ConnectionTest {
        self.state.connection_tests.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.test_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.connection_ok.load(Ordering::SeqCst) {
            ConnectionTest::ok(format!("mock {} account reachable", self.platform))
        } else {
            ConnectionTest::failed("platform rejected credentials: invalid token")
        }
    }
}

/// Builds [`MockPlatformAdapter`]s for every platform.
pub struct MockAdapterFactory {
    state: Arc<MockPlatformState>,
}

impl MockAdapterFactory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockPlatformState::new()),
        }
    }

    pub fn state(&self) -> Arc<MockPlatformState> {
        Arc::clone(&self.state)
    }
}

impl Default for MockAdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterFactory for MockAdapterFactory {
    fn build(
        &self,
        tenant: &TenantId,
        platform: Platform,
        credentials: &Credentials,
    ) -> Result<Arc<dyn PlatformAdapter>, NexusError> {
        credentials.validate_for(platform)?;
        self.state.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockPlatformAdapter {
            tenant: tenant.clone(),
            platform,
            state: Arc::clone(&self.state),
        }))
    }

    fn parse_webhook(&self, platform: Platform, payload: &Value) -> Result<ParsedWebhook, NexusError> {
        parse_mock_payload(platform, payload)
    }
}

/// Credentials that pass validation for `platform`, with placeholder values.
pub fn valid_credentials(platform: Platform) -> Credentials {
    platform
        .required_credentials()
        .iter()
        .fold(Credentials::new(), |creds, field| {
            creds.with(*field, format!("test-{field}"))
        })
}

/// One inbound message in the mock wire format.
#[derive(Debug, Clone)]
pub struct MockInbound {
    pub from: String,
    pub name: Option<String>,
    pub text: String,
    pub id: Option<String>,
    pub timestamp_ms: Option<i64>,
}

impl MockInbound {
    pub fn text(from: &str, text: &str) -> Self {
        Self {
            from: from.to_string(),
            name: None,
            text: text.to_string(),
            id: None,
            timestamp_ms: None,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}

/// Builds a mock webhook payload carrying `messages` in order.
pub fn inbound_payload(messages: &[MockInbound]) -> Value {
    let items: Vec<Value> = messages
        .iter()
        .map(|m| {
            json!({
                "from": m.from,
                "name": m.name,
                "text": m.text,
                "id": m.id,
                "timestamp": m.timestamp_ms,
            })
        })
        .collect();
    json!({ "messages": items })
}

/// A mock delivery receipt, which normalizes to a dropped item.
pub fn receipt_payload() -> Value {
    json!({ "receipts": [{ "id": "m1", "status": "read" }] })
}

fn parse_mock_payload(platform: Platform, payload: &Value) -> Result<ParsedWebhook, NexusError> {
    let Some(object) = payload.as_object() else {
        return Err(NexusError::Normalization {
            platform,
            message: "mock payload must be an object".into(),
        });
    };

    let mut parsed = ParsedWebhook::default();
    if let Some(receipts) = object.get("receipts").and_then(Value::as_array) {
        parsed.dropped += receipts.len();
    }
    for item in object
        .get("messages")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let from = item.get("from").and_then(Value::as_str).unwrap_or_default();
        let text = item.get("text").and_then(Value::as_str).unwrap_or_default();
        if from.is_empty() || text.is_empty() {
            parsed.skipped += 1;
            continue;
        }
        parsed.events.push(InboundEvent {
            external_sender_id: from.to_string(),
            sender_display_name: item.get("name").and_then(Value::as_str).map(String::from),
            content: text.to_string(),
            message_type: MessageType::Text,
            raw_attachments: Vec::new(),
            platform_message_id: item
                .get("id")
                .and_then(Value::as_str)
                .map(|id| PlatformMessageId(id.to_string())),
            platform_timestamp: item
                .get("timestamp")
                .and_then(Value::as_i64)
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        });
    }
    Ok(parsed)
}
