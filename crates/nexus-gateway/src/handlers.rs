// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Management API handlers.
//!
//! Bridge lifecycle under `/v1/bridges`, outbound sends under
//! `/v1/messages`, and conversation history under `/v1/conversations`.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use nexus_bridge::{BridgeStatusReport, ConnectionReport, OutboundMessage, SetupInstructions};
use nexus_core::{ConversationStatus, Credentials, MessageType, NexusError, Platform, TenantId};
use nexus_storage::queries::{conversations, messages};
use nexus_storage::{BridgeRecord, Conversation, Message, MessageCursor, MessageOrder};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, bad_request};
use crate::server::GatewayState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Largest page the message listing returns.
const MAX_PAGE: u32 = 200;

// --- Bridges -------------------------------------------------------------

pub async fn setup_bridge(
    State(state): State<GatewayState>,
    Path((tenant, platform)): Path<(TenantId, Platform)>,
) -> ApiResult<SetupInstructions> {
    Ok(Json(state.manager.initiate_setup(&tenant, platform).await?))
}

pub async fn configure_bridge(
    State(state): State<GatewayState>,
    Path((tenant, platform)): Path<(TenantId, Platform)>,
    Json(credentials): Json<Credentials>,
) -> ApiResult<BridgeRecord> {
    Ok(Json(
        state.manager.configure(&tenant, platform, credentials).await?,
    ))
}

pub async fn test_bridge(
    State(state): State<GatewayState>,
    Path((tenant, platform)): Path<(TenantId, Platform)>,
) -> ApiResult<ConnectionReport> {
    Ok(Json(state.manager.test_connection(&tenant, platform).await?))
}

pub async fn activate_bridge(
    State(state): State<GatewayState>,
    Path((tenant, platform)): Path<(TenantId, Platform)>,
) -> ApiResult<BridgeRecord> {
    Ok(Json(state.manager.activate(&tenant, platform).await?))
}

pub async fn deactivate_bridge(
    State(state): State<GatewayState>,
    Path((tenant, platform)): Path<(TenantId, Platform)>,
) -> ApiResult<BridgeRecord> {
    Ok(Json(state.manager.deactivate(&tenant, platform).await?))
}

pub async fn get_bridge(
    State(state): State<GatewayState>,
    Path((tenant, platform)): Path<(TenantId, Platform)>,
) -> ApiResult<BridgeStatusReport> {
    Ok(Json(state.manager.status(&tenant, platform).await?))
}

#[derive(Debug, Serialize)]
pub struct BridgeList {
    pub bridges: Vec<BridgeRecord>,
}

pub async fn list_bridges(
    State(state): State<GatewayState>,
    Path(tenant): Path<TenantId>,
) -> ApiResult<BridgeList> {
    Ok(Json(BridgeList {
        bridges: state.manager.list(&tenant).await?,
    }))
}

// --- Messages ------------------------------------------------------------

/// Request body for POST /v1/messages.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub tenant: TenantId,
    pub platform: Platform,
    pub external_id: String,
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    /// Retry transient failures with backoff before answering.
    #[serde(default)]
    pub retry: bool,
}

/// POST /v1/messages
pub async fn send_message(
    State(state): State<GatewayState>,
    Json(body): Json<SendRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    if body.content.trim().is_empty() {
        return Err(bad_request("content must not be empty"));
    }
    let request = OutboundMessage {
        message_type: body.message_type,
        ..OutboundMessage::text(body.tenant, body.platform, body.external_id, body.content)
    };
    let stored = if body.retry {
        state.manager.send_message_with_retry(request).await?
    } else {
        state.manager.send_message(request).await?
    };
    Ok((StatusCode::CREATED, Json(stored)))
}

// --- Conversations -------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ConversationFilter {
    pub platform: Option<Platform>,
    pub status: Option<ConversationStatus>,
}

#[derive(Debug, Serialize)]
pub struct ConversationList {
    pub conversations: Vec<Conversation>,
}

/// GET /v1/conversations/{tenant}
pub async fn list_conversations(
    State(state): State<GatewayState>,
    Path(tenant): Path<TenantId>,
    Query(filter): Query<ConversationFilter>,
) -> ApiResult<ConversationList> {
    let conversations = conversations::list_conversations(
        state.manager.database(),
        &tenant,
        filter.platform,
        filter.status,
    )
    .await?;
    Ok(Json(ConversationList { conversations }))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// `oldest` or `newest`. Defaults to `oldest`.
    pub order: Option<String>,
    pub limit: Option<u32>,
    pub before_ts: Option<i64>,
    pub before_seq: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// Pass back as `before_ts`/`before_seq` to read the next older page.
    pub next_before: Option<MessageCursor>,
}

/// GET /v1/conversations/{tenant}/{conversation_id}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path((tenant, conversation_id)): Path<(TenantId, String)>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<MessagePage> {
    let order = match query.order.as_deref() {
        None | Some("oldest") => MessageOrder::OldestFirst,
        Some("newest") => MessageOrder::NewestFirst,
        Some(other) => return Err(bad_request(format!("unknown order '{other}'"))),
    };
    let before = match (query.before_ts, query.before_seq) {
        (Some(timestamp_ms), Some(seq)) => Some(MessageCursor { timestamp_ms, seq }),
        (None, None) => None,
        _ => return Err(bad_request("before_ts and before_seq must be given together")),
    };
    let limit = query.limit.unwrap_or(50).clamp(1, MAX_PAGE);

    let db = state.manager.database();
    let conversation = conversations::get_conversation(db, &conversation_id)
        .await?
        .filter(|c| c.tenant_id == tenant)
        .ok_or_else(|| NexusError::not_found("conversation", conversation_id.clone()))?;

    let page = messages::list_messages(db, &conversation.id, order, limit, before).await?;
    let next_before = if page.len() as u32 == limit {
        page.iter().map(Message::cursor).min()
    } else {
        None
    };
    Ok(Json(MessagePage {
        messages: page,
        next_before,
    }))
}

// --- Health --------------------------------------------------------------

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub cached_adapters: usize,
    pub queue_depth: usize,
}

pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        cached_adapters: state.manager.registry().len(),
        queue_depth: state.manager.queue_depth(),
    })
}

/// GET /metrics
///
/// Prometheus text exposition, or 404 when metrics are disabled.
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
