// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workspace sinks the binary can forward into.
//!
//! [`HttpWorkspace`] talks JSON to a workspace bridge service;
//! [`LogWorkspace`] only logs, for deployments without one.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nexus_core::{NexusError, Platform, RoomHandle, TenantId, WorkspaceEventId, WorkspaceSink};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct InitializeRequest<'a> {
    tenant_id: &'a TenantId,
    platform: Platform,
    public_ids: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    room: &'a RoomHandle,
    text: &'a str,
}

#[derive(Serialize)]
struct RoomRequest<'a> {
    tenant_id: &'a TenantId,
    platform: Platform,
    external_id: &'a str,
}

#[derive(Deserialize)]
struct RoomResponse {
    room: String,
}

#[derive(Deserialize)]
struct SendResponse {
    event_id: String,
}

/// JSON-over-HTTP workspace client.
///
/// - `POST {base}/bridges` links a tenant bridge and returns its room
/// - `POST {base}/rooms` resolves the room for one external contact
/// - `POST {base}/rooms/messages` posts text into a room
pub struct HttpWorkspace {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpWorkspace {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, NexusError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NexusError::Config(format!("failed to build workspace client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, NexusError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| NexusError::Transient {
            message: format!("workspace request to {path} failed"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), &body));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| NexusError::permanent(format!("workspace response from {path} is malformed: {e}")))
    }
}

/// 408, 429 and 5xx are retried by the replay sweep; anything else is not.
fn classify_failure(status: u16, body: &str) -> NexusError {
    let detail: String = body.chars().take(200).collect();
    let message = format!("workspace returned {status}: {detail}");
    match status {
        408 | 429 | 500..=599 => NexusError::transient(message),
        _ => NexusError::permanent(message),
    }
}

#[async_trait]
impl WorkspaceSink for HttpWorkspace {
    async fn initialize_tenant_bridge(
        &self,
        tenant: &TenantId,
        platform: Platform,
        public_ids: &BTreeMap<String, String>,
    ) -> Result<RoomHandle, NexusError> {
        let response: RoomResponse = self
            .post(
                "/bridges",
                &InitializeRequest {
                    tenant_id: tenant,
                    platform,
                    public_ids,
                },
            )
            .await?;
        info!(tenant = %tenant, platform = %platform, room = %response.room, "workspace bridge linked");
        Ok(RoomHandle(response.room))
    }

    async fn send_to_room(
        &self,
        room: &RoomHandle,
        text: &str,
    ) -> Result<WorkspaceEventId, NexusError> {
        let response: SendResponse = self.post("/rooms/messages", &SendRequest { room, text }).await?;
        Ok(WorkspaceEventId(response.event_id))
    }

    async fn get_or_create_room(
        &self,
        tenant: &TenantId,
        platform: Platform,
        external_id: &str,
    ) -> Result<RoomHandle, NexusError> {
        let response: RoomResponse = self
            .post(
                "/rooms",
                &RoomRequest {
                    tenant_id: tenant,
                    platform,
                    external_id,
                },
            )
            .await?;
        Ok(RoomHandle(response.room))
    }
}

/// Logs every forward. Room handles are derived from their inputs.
#[derive(Default)]
pub struct LogWorkspace {
    next_event: AtomicU64,
}

impl LogWorkspace {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkspaceSink for LogWorkspace {
    async fn initialize_tenant_bridge(
        &self,
        tenant: &TenantId,
        platform: Platform,
        public_ids: &BTreeMap<String, String>,
    ) -> Result<RoomHandle, NexusError> {
        let room = RoomHandle(format!("!{tenant}-{platform}:local"));
        info!(tenant = %tenant, platform = %platform, room = %room.0, ids = ?public_ids, "workspace bridge initialized");
        Ok(room)
    }

    async fn send_to_room(
        &self,
        room: &RoomHandle,
        text: &str,
    ) -> Result<WorkspaceEventId, NexusError> {
        let n = self.next_event.fetch_add(1, Ordering::Relaxed) + 1;
        info!(room = %room.0, text, "workspace forward");
        Ok(WorkspaceEventId(format!("$log-{n}")))
    }

    async fn get_or_create_room(
        &self,
        tenant: &TenantId,
        platform: Platform,
        external_id: &str,
    ) -> Result<RoomHandle, NexusError> {
        let room = RoomHandle(format!("!{tenant}-{platform}-{external_id}:local"));
        debug!(room = %room.0, "workspace room resolved");
        Ok(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn http_workspace_posts_json_with_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms/messages"))
            .and(header("authorization", "Bearer ws-token"))
            .and(body_json(json!({"room": "!r:hq", "text": "[SIGNAL] +1555: hi"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"event_id": "$e1"})))
            .expect(1)
            .mount(&server)
            .await;

        let workspace = HttpWorkspace::new(&server.uri(), Some("ws-token".into())).unwrap();
        let event = workspace
            .send_to_room(&RoomHandle("!r:hq".into()), "[SIGNAL] +1555: hi")
            .await
            .unwrap();
        assert_eq!(event, WorkspaceEventId("$e1".into()));
    }

    #[tokio::test]
    async fn http_workspace_resolves_rooms() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms"))
            .and(body_json(json!({"tenant_id": "acme", "platform": "telegram", "external_id": "42"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"room": "!acme-42:hq"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/bridges"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"room": "!acme:hq"})))
            .mount(&server)
            .await;

        let workspace = HttpWorkspace::new(&format!("{}/", server.uri()), None).unwrap();
        let tenant = TenantId::from("acme");
        let room = workspace
            .get_or_create_room(&tenant, Platform::Telegram, "42")
            .await
            .unwrap();
        assert_eq!(room, RoomHandle("!acme-42:hq".into()));

        let ids = BTreeMap::from([("bot_username".to_string(), "acme_bot".to_string())]);
        let room = workspace
            .initialize_tenant_bridge(&tenant, Platform::Telegram, &ids)
            .await
            .unwrap();
        assert_eq!(room, RoomHandle("!acme:hq".into()));
    }

    #[tokio::test]
    async fn http_workspace_classifies_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rooms/messages"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rooms/messages"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such room"))
            .mount(&server)
            .await;

        let workspace = HttpWorkspace::new(&server.uri(), None).unwrap();
        let room = RoomHandle("!gone:hq".into());

        let err = workspace.send_to_room(&room, "x").await.unwrap_err();
        assert!(err.kind().is_retryable(), "503 should be retryable: {err}");

        let err = workspace.send_to_room(&room, "x").await.unwrap_err();
        assert!(matches!(err, NexusError::Permanent { .. }));
        assert!(err.to_string().contains("no such room"));
    }

    #[tokio::test]
    async fn unreachable_workspace_is_transient() {
        let workspace = HttpWorkspace::new("http://127.0.0.1:9", None).unwrap();
        let err = workspace
            .send_to_room(&RoomHandle("!r:hq".into()), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::Transient { .. }));
    }

    #[tokio::test]
    async fn log_workspace_is_deterministic() {
        let workspace = LogWorkspace::new();
        let tenant = TenantId::from("acme");
        let a = workspace
            .get_or_create_room(&tenant, Platform::WhatsApp, "1555")
            .await
            .unwrap();
        let b = workspace
            .get_or_create_room(&tenant, Platform::WhatsApp, "1555")
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.0, "!acme-whatsapp-1555:local");

        let first = workspace.send_to_room(&a, "one").await.unwrap();
        let second = workspace.send_to_room(&a, "two").await.unwrap();
        assert_ne!(first, second);
    }
}
