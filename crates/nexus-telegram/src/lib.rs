// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram adapter for the Nexus bridge.
//!
//! Implements [`PlatformAdapter`] for the Telegram Bot API via teloxide.
//! Updates arrive by webhook (see [`normalize`]); the adapter only sends
//! and probes the bot identity.

pub mod normalize;

use async_trait::async_trait;
use nexus_config::model::PlatformsConfig;
use nexus_core::{
    ConnectionTest, Credentials, MessageType, NexusError, ParsedWebhook, Platform,
    PlatformAdapter, PlatformMessageId, PluginAdapter,
};
use teloxide::prelude::*;
use teloxide::types::{ChatId, Recipient};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

/// Telegram adapter for one tenant bot.
#[derive(Debug)]
pub struct TelegramAdapter {
    bot: Bot,
    bot_username: Option<String>,
}

impl TelegramAdapter {
    /// Creates the adapter from the bridge credentials.
    ///
    /// Requires `bot_token`. `config.telegram_api_url` selects the Bot API
    /// server, which lets tests and self-hosted API servers stand in.
    pub fn new(credentials: &Credentials, config: &PlatformsConfig) -> Result<Self, NexusError> {
        let token = credentials.require("bot_token")?;
        let api_url = reqwest::Url::parse(&config.telegram_api_url).map_err(|e| {
            NexusError::Config(format!(
                "platforms.telegram_api_url `{}` is invalid: {e}",
                config.telegram_api_url
            ))
        })?;

        Ok(Self {
            bot: Bot::new(token).set_api_url(api_url),
            bot_username: credentials
                .get("bot_username")
                .map(|u| u.trim_start_matches('@').to_string()),
        })
    }
}

/// Parses a chat id. Telegram chat ids are signed 64-bit integers.
fn chat_id(recipient: &str) -> Result<ChatId, NexusError> {
    recipient
        .trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| NexusError::permanent(format!("invalid Telegram chat id `{recipient}`")))
}

/// Maps teloxide failures onto the bridge error taxonomy.
fn classify(e: RequestError) -> NexusError {
    match &e {
        RequestError::Api(ApiError::InvalidToken) => {
            NexusError::auth(Platform::Telegram, e.to_string())
        }
        RequestError::Api(
            ApiError::ChatNotFound | ApiError::BotBlocked | ApiError::UserDeactivated,
        ) => NexusError::permanent(format!("telegram rejected the recipient: {e}")),
        RequestError::Api(_) | RequestError::MigrateToChatId(_) => {
            NexusError::permanent(format!("telegram API error: {e}"))
        }
        _ => NexusError::Transient {
            message: format!("telegram request failed: {e}"),
            source: Some(Box::new(e)),
        },
    }
}

#[async_trait]
impl PluginAdapter for TelegramAdapter {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn shutdown(&self) -> Result<(), NexusError> {
        debug!("telegram adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for TelegramAdapter {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn send_message(
        &self,
        recipient: &str,
        content: &str,
        _message_type: MessageType,
    ) -> Result<PlatformMessageId, NexusError> {
        let chat = chat_id(recipient)?;
        let sent = self
            .bot
            .send_message(Recipient::Id(chat), content)
            .await
            .map_err(classify)?;
        Ok(PlatformMessageId(sent.id.0.to_string()))
    }

    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<ParsedWebhook, NexusError> {
        normalize::parse_update(payload)
    }

    async fn test_connection(&self) -> ConnectionTest {
        match self.bot.get_me().await {
            Ok(me) => {
                let username = me.username().to_string();
                if let Some(expected) = &self.bot_username
                    && !expected.eq_ignore_ascii_case(&username)
                {
                    warn!(expected = %expected, actual = %username, "bot username differs from configured value");
                }
                ConnectionTest::ok(format!("authenticated as @{username}"))
            }
            Err(e) => ConnectionTest::failed(classify(e).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials::new()
            .with("bot_token", "123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11")
            .with("bot_username", "acme_support_bot")
    }

    fn adapter(server: &MockServer) -> TelegramAdapter {
        let config = PlatformsConfig {
            telegram_api_url: server.uri(),
            ..PlatformsConfig::default()
        };
        TelegramAdapter::new(&credentials(), &config).unwrap()
    }

    #[test]
    fn new_requires_bot_token() {
        let err = TelegramAdapter::new(&Credentials::new(), &PlatformsConfig::default()).unwrap_err();
        assert!(matches!(err, NexusError::Config(_)));
    }

    #[test]
    fn invalid_api_url_is_config_error() {
        let config = PlatformsConfig {
            telegram_api_url: "not a url".into(),
            ..PlatformsConfig::default()
        };
        assert!(matches!(
            TelegramAdapter::new(&credentials(), &config),
            Err(NexusError::Config(_))
        ));
    }

    #[test]
    fn chat_ids_must_be_numeric() {
        assert_eq!(chat_id("-100123").unwrap(), ChatId(-100123));
        assert!(matches!(chat_id("@someone"), Err(NexusError::Permanent { .. })));
    }

    #[test]
    fn adapter_identity() {
        let adapter = TelegramAdapter::new(&credentials(), &PlatformsConfig::default()).unwrap();
        assert_eq!(adapter.name(), "telegram");
        assert_eq!(adapter.platform(), Platform::Telegram);
    }

    #[tokio::test]
    async fn send_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot[^/]+/sendmessage$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "result": {
                    "message_id": 4242,
                    "date": 1_767_225_600,
                    "chat": {"id": 123456789, "type": "private", "first_name": "Grace"},
                    "text": "hello"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = adapter(&server)
            .send_message("123456789", "hello", MessageType::Text)
            .await
            .unwrap();
        assert_eq!(id, PlatformMessageId("4242".into()));
    }

    #[tokio::test]
    async fn unauthorized_token_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot[^/]+/sendmessage$"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false, "error_code": 401, "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .send_message("123456789", "hello", MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Auth { platform: Platform::Telegram, .. }));
    }

    #[tokio::test]
    async fn unknown_chat_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot[^/]+/sendmessage$"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false, "error_code": 400, "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .send_message("999", "hello", MessageType::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Permanent { .. }));
    }

    #[tokio::test]
    async fn test_connection_fails_with_bad_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot[^/]+/getme$"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "ok": false, "error_code": 401, "description": "Unauthorized"
            })))
            .mount(&server)
            .await;

        let result = adapter(&server).test_connection().await;
        assert!(!result.ok);
        assert!(result.diagnostic.contains("rejected credentials"));
    }
}
