// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meta platform support.
//!
//! [`graph::GraphClient`] is shared with the WhatsApp adapter.
//! [`MessengerAdapter`] implements [`PlatformAdapter`] for Instagram and
//! Facebook, which differ only in the name of the access-token credential.

pub mod graph;
pub mod normalize;

use async_trait::async_trait;
use nexus_config::model::PlatformsConfig;
use nexus_core::{
    ConnectionTest, Credentials, MessageType, NexusError, ParsedWebhook, Platform,
    PlatformAdapter, PlatformMessageId, PluginAdapter,
};
use serde_json::json;
use tracing::debug;

use crate::graph::GraphClient;

/// Instagram Direct or Facebook Messenger adapter for one page.
#[derive(Debug)]
pub struct MessengerAdapter {
    platform: Platform,
    page_id: String,
    graph: GraphClient,
}

impl MessengerAdapter {
    pub fn new(
        platform: Platform,
        credentials: &Credentials,
        config: &PlatformsConfig,
    ) -> Result<Self, NexusError> {
        let token_field = token_field(platform)?;
        let token = credentials.require(token_field)?;
        let page_id = credentials.require("page_id")?.to_string();
        Ok(Self {
            platform,
            page_id,
            graph: GraphClient::new(config, platform, token)?,
        })
    }
}

fn token_field(platform: Platform) -> Result<&'static str, NexusError> {
    match platform {
        Platform::Instagram => Ok("access_token"),
        Platform::Facebook => Ok("page_access_token"),
        other => Err(NexusError::Config(format!(
            "{other} is not served by the messenger adapter"
        ))),
    }
}

#[async_trait]
impl PluginAdapter for MessengerAdapter {
    fn name(&self) -> &str {
        match self.platform {
            Platform::Instagram => "instagram",
            _ => "facebook",
        }
    }

    async fn shutdown(&self) -> Result<(), NexusError> {
        debug!(platform = %self.platform, page_id = %self.page_id, "messenger adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl PlatformAdapter for MessengerAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn send_message(
        &self,
        recipient: &str,
        content: &str,
        _message_type: MessageType,
    ) -> Result<PlatformMessageId, NexusError> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(NexusError::permanent("recipient id is empty"));
        }
        let body = json!({
            "recipient": {"id": recipient},
            "message": {"text": content},
        });
        let response = self
            .graph
            .post(&format!("{}/messages", self.page_id), &body)
            .await?;
        response
            .get("message_id")
            .and_then(|v| v.as_str())
            .map(|id| PlatformMessageId(id.to_string()))
            .ok_or_else(|| NexusError::Internal("send response has no message_id".into()))
    }

    fn parse_webhook(&self, payload: &serde_json::Value) -> Result<ParsedWebhook, NexusError> {
        normalize::parse_messaging(self.platform, payload)
    }

    async fn test_connection(&self) -> ConnectionTest {
        match self.graph.get(&self.page_id).await {
            Ok(page) => {
                let name = page.get("name").and_then(|v| v.as_str()).unwrap_or(&self.page_id);
                ConnectionTest::ok(format!("connected to page {name}"))
            }
            Err(e) => ConnectionTest::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn facebook_credentials() -> Credentials {
        Credentials::new()
            .with("page_access_token", "EAAB-page")
            .with("page_id", "777")
            .with("app_secret", "shh")
    }

    async fn adapter(server: &MockServer, platform: Platform, creds: &Credentials) -> MessengerAdapter {
        let config = PlatformsConfig {
            graph_api_base: server.uri(),
            ..PlatformsConfig::default()
        };
        MessengerAdapter::new(platform, creds, &config).unwrap()
    }

    #[test]
    fn constructor_requires_platform_token() {
        let creds = Credentials::new().with("access_token", "x").with("page_id", "1");
        let err = MessengerAdapter::new(Platform::Facebook, &creds, &PlatformsConfig::default())
            .unwrap_err();
        assert!(matches!(err, NexusError::Config(_)));
        assert!(MessengerAdapter::new(Platform::Instagram, &creds, &PlatformsConfig::default()).is_ok());
        assert!(MessengerAdapter::new(Platform::Signal, &creds, &PlatformsConfig::default()).is_err());
    }

    #[tokio::test]
    async fn send_posts_recipient_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/777/messages"))
            .and(header("authorization", "Bearer EAAB-page"))
            .and(body_json(json!({"recipient": {"id": "PSID-9"}, "message": {"text": "hello"}})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"recipient_id": "PSID-9", "message_id": "m_sent"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, Platform::Facebook, &facebook_credentials()).await;
        let id = adapter.send_message("PSID-9", "hello", MessageType::Text).await.unwrap();
        assert_eq!(id, PlatformMessageId("m_sent".into()));
    }

    #[tokio::test]
    async fn rejected_token_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v18.0/777/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Error validating access token", "type": "OAuthException", "code": 190}
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server, Platform::Facebook, &facebook_credentials()).await;
        let err = adapter.send_message("PSID-9", "hello", MessageType::Text).await.unwrap_err();
        assert!(matches!(err, NexusError::Auth { platform: Platform::Facebook, .. }));
    }

    #[tokio::test]
    async fn empty_recipient_is_permanent() {
        let server = MockServer::start().await;
        let adapter = adapter(&server, Platform::Facebook, &facebook_credentials()).await;
        let err = adapter.send_message("  ", "hello", MessageType::Text).await.unwrap_err();
        assert!(matches!(err, NexusError::Permanent { .. }));
    }

    #[tokio::test]
    async fn test_connection_reports_page_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v18.0/555"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "555", "name": "Acme Shop"})))
            .mount(&server)
            .await;

        let creds = Credentials::new()
            .with("access_token", "ig-token")
            .with("page_id", "555")
            .with("app_secret", "s");
        let adapter = adapter(&server, Platform::Instagram, &creds).await;
        let result = adapter.test_connection().await;
        assert!(result.ok);
        assert!(result.diagnostic.contains("Acme Shop"));
    }

    #[tokio::test]
    async fn test_connection_failure_carries_diagnostic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v18.0/777"))
            .respond_with(ResponseTemplate::new(401).set_body_string("nope"))
            .mount(&server)
            .await;

        let adapter = adapter(&server, Platform::Facebook, &facebook_credentials()).await;
        let result = adapter.test_connection().await;
        assert!(!result.ok);
        assert!(result.diagnostic.contains("401"));
    }
}
