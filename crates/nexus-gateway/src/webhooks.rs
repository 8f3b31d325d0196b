// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public webhook endpoints, one per platform and tenant.
//!
//! POST always answers `200 {"status":"ok"}`. Platforms retry aggressively
//! on anything else, so every failure is logged and recorded instead of
//! being returned.

use std::collections::HashMap;
use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nexus_core::{NexusError, Platform, TenantId};
use serde_json::{Value, json};

use crate::auth::tokens_match;
use crate::server::GatewayState;

fn ack() -> Response {
    (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
}

/// POST /api/webhooks/{platform}/{tenant}
pub async fn receive(
    State(state): State<GatewayState>,
    Path((platform, tenant)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let Ok(platform) = Platform::from_str(&platform) else {
        tracing::warn!(platform = %platform, tenant = %tenant, "webhook for unknown platform");
        return ack();
    };
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(platform = %platform, tenant = %tenant, error = %e, "webhook body is not JSON");
            return ack();
        }
    };

    let tenant = TenantId::from(tenant);
    match state.manager.handle_webhook(&tenant, platform, &payload).await {
        Ok(event_id) => {
            tracing::debug!(platform = %platform, tenant = %tenant, event_id, "webhook accepted");
        }
        Err(e @ (NexusError::NotFound { .. } | NexusError::Config(_))) => {
            tracing::warn!(platform = %platform, tenant = %tenant, error = %e, "webhook ignored");
        }
        Err(e) => {
            tracing::error!(platform = %platform, tenant = %tenant, error = %e, "webhook could not be stored");
        }
    }
    ack()
}

/// GET /api/webhooks/{platform}/{tenant}
///
/// Subscription handshake: echoes `hub.challenge` when `hub.verify_token`
/// matches the bridge's stored `webhook_verify_token`.
pub async fn verify(
    State(state): State<GatewayState>,
    Path((platform, tenant)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let forbidden = || StatusCode::FORBIDDEN.into_response();

    let Ok(platform) = Platform::from_str(&platform) else {
        return forbidden();
    };
    if params.get("hub.mode").map(String::as_str) != Some("subscribe") {
        return forbidden();
    }
    let (Some(token), Some(challenge)) = (params.get("hub.verify_token"), params.get("hub.challenge"))
    else {
        return forbidden();
    };

    let tenant = TenantId::from(tenant);
    let credentials = match state.manager.credentials(&tenant, platform).await {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::warn!(platform = %platform, tenant = %tenant, error = %e, "verification for unusable bridge");
            return forbidden();
        }
    };

    match credentials.get("webhook_verify_token") {
        Some(expected) if !expected.is_empty() && tokens_match(token, expected) => {
            tracing::info!(platform = %platform, tenant = %tenant, "webhook subscription verified");
            (StatusCode::OK, challenge.clone()).into_response()
        }
        _ => {
            tracing::warn!(platform = %platform, tenant = %tenant, "webhook verify token mismatch");
            forbidden()
        }
    }
}
