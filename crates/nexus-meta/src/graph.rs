// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal Graph API client shared by the WhatsApp, Instagram and
//! Facebook adapters.
//!
//! Only JSON GET/POST with a bearer token is needed. Every failure is
//! classified into the bridge error taxonomy here, so adapters never look
//! at HTTP status codes themselves.

use std::time::Duration;

use nexus_config::model::PlatformsConfig;
use nexus_core::{NexusError, Platform};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Graph error code for an invalid or expired access token.
const GRAPH_INVALID_TOKEN: i64 = 190;

#[derive(Debug)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    platform: Platform,
    access_token: SecretString,
}

impl GraphClient {
    pub fn new(
        config: &PlatformsConfig,
        platform: Platform,
        access_token: &str,
    ) -> Result<Self, NexusError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| NexusError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: format!(
                "{}/{}",
                config.graph_api_base.trim_end_matches('/'),
                config.graph_api_version
            ),
            platform,
            access_token: SecretString::from(access_token.to_string()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str) -> Result<serde_json::Value, NexusError> {
        let request = self
            .client
            .get(self.url(path))
            .bearer_auth(self.access_token.expose_secret());
        self.execute(request).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, NexusError> {
        let request = self
            .client
            .post(self.url(path))
            .bearer_auth(self.access_token.expose_secret())
            .json(body);
        self.execute(request).await
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, NexusError> {
        let response = request.send().await.map_err(|e| NexusError::Transient {
            message: format!("{} request failed: {e}", self.platform),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        debug!(platform = %self.platform, status = %status, "graph response received");

        let body = response.text().await.map_err(|e| NexusError::Transient {
            message: format!("failed to read {} response body: {e}", self.platform),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(classify_failure(self.platform, status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| NexusError::Transient {
            message: format!("unparseable {} response: {e}", self.platform),
            source: None,
        })
    }
}

/// Maps a non-success Graph API response onto the error taxonomy.
///
/// 401/403 or Graph code 190 are auth failures; 408, 429 and 5xx are
/// transient; any other status is permanent.
pub fn classify_failure(platform: Platform, status: u16, body: &str) -> NexusError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let code = error.and_then(|e| e.get("code")).and_then(|c| c.as_i64());
    let detail = error
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(String::from)
        .unwrap_or_else(|| body.chars().take(200).collect());
    let message = format!("{platform} API returned {status}: {detail}");

    match status {
        401 | 403 => NexusError::auth(platform, message),
        _ if code == Some(GRAPH_INVALID_TOKEN) => NexusError::auth(platform, message),
        408 | 429 | 500..=599 => NexusError::transient(message),
        _ => NexusError::permanent(message),
    }
}
