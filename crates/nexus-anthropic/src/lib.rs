// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude response scorer for the Nexus bridge engine.
//!
//! This crate implements [`ResponseScorer`] on top of the Anthropic Messages
//! API. The model is asked for a JSON object carrying the suggested reply and
//! its own confidence; replies that are not JSON are accepted as plain text
//! with no confidence so the orchestrator can apply its fallback heuristic.

pub mod client;
pub mod types;

use async_trait::async_trait;
use nexus_config::model::AnthropicConfig;
use nexus_core::{
    Direction, NexusError, ResponseScorer, ScoreRequest, ScoredResponse, TenantProfile,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

/// Claude-backed scorer. Stateless between calls.
pub struct AnthropicScorer {
    client: AnthropicClient,
    max_tokens: u32,
    temperature: f64,
}

impl AnthropicScorer {
    /// Creates a scorer from the `[anthropic]` section.
    ///
    /// # API Key Resolution
    /// 1. `anthropic.api_key` if set
    /// 2. `ANTHROPIC_API_KEY` environment variable
    /// 3. Returns a configuration error otherwise
    pub fn new(config: &AnthropicConfig) -> Result<Self, NexusError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = AnthropicClient::new(
            api_key,
            config.api_version.clone(),
            config.model.clone(),
        )?;
        info!(model = %config.model, "Anthropic scorer initialized");
        Ok(Self::with_client(client, config.max_tokens, config.temperature))
    }

    fn with_client(client: AnthropicClient, max_tokens: u32, temperature: f64) -> Self {
        Self {
            client,
            max_tokens,
            temperature,
        }
    }

    fn to_message_request(&self, request: &ScoreRequest) -> MessageRequest {
        MessageRequest {
            model: self.client.default_model().to_string(),
            messages: vec![ApiMessage::user(build_user_prompt(request))],
            system: Some(build_system_prompt(&request.tenant)),
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        }
    }
}

/// Resolves the API key from config or environment.
fn resolve_api_key(config_key: &Option<String>) -> Result<String, NexusError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("ANTHROPIC_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            NexusError::Config(
                "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
            )
        })
}

/// Company context and answering rules.
pub fn build_system_prompt(tenant: &TenantProfile) -> String {
    let mut prompt = format!(
        "You are a customer service representative for {name}, a company in the {industry} industry.\n\
         Be professional and helpful. Provide accurate information and keep replies concise but complete.\n\
         If you do not know something, or the customer needs a person, say so and set requires_human to true.",
        name = tenant.name,
        industry = tenant.industry.as_deref().unwrap_or("general business"),
    );
    if let Some(extra) = tenant.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str("\n\n");
        prompt.push_str(extra.trim());
    }
    prompt
}

/// Conversation history plus the message to answer.
pub fn build_user_prompt(request: &ScoreRequest) -> String {
    let mut prompt = String::new();
    if !request.history.is_empty() {
        prompt.push_str("Recent conversation history:\n");
        for turn in &request.history {
            let role = match turn.direction {
                Direction::Inbound => "Customer",
                Direction::Outbound => "Agent",
            };
            prompt.push_str(&format!("{role}: {}\n", turn.content));
        }
        prompt.push('\n');
    }
    let who = request.customer_name.as_deref().unwrap_or("the customer");
    prompt.push_str(&format!(
        "Current message from {who} on {platform}: \"{message}\"\n\n\
         Respond with only a JSON object of the form:\n\
         {{\"response\": \"your reply\", \"confidence\": 0.0, \"intent\": \"detected_intent\", \"requires_human\": false}}\n\
         where confidence is between 0 and 1.",
        platform = request.platform,
        message = request.message,
    ));
    prompt
}

#[derive(Debug, Deserialize)]
struct RawScore {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    requires_human: bool,
}

/// Interprets model output.
///
/// The JSON object between the first `{` and the last `}` wins. Anything
/// else is taken verbatim as the reply with no confidence.
pub fn parse_scored_response(text: &str) -> Result<ScoredResponse, NexusError> {
    let trimmed = text.trim();
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
        && let Ok(raw) = serde_json::from_str::<RawScore>(&trimmed[start..=end])
        && let Some(reply) = raw.response.filter(|r| !r.trim().is_empty())
    {
        return Ok(ScoredResponse {
            text: reply.trim().to_string(),
            confidence: raw
                .confidence
                .filter(|c| c.is_finite())
                .map(|c| c.clamp(0.0, 1.0)),
            intent: raw.intent.filter(|i| !i.is_empty()),
            requires_human: raw.requires_human,
        });
    }

    if trimmed.is_empty() {
        return Err(NexusError::permanent("scorer returned an empty reply"));
    }
    Ok(ScoredResponse {
        text: trimmed.to_string(),
        confidence: None,
        intent: None,
        requires_human: false,
    })
}

#[async_trait]
impl ResponseScorer for AnthropicScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoredResponse, NexusError> {
        let api_request = self.to_message_request(request);
        let response = self.client.complete_message(&api_request).await?;
        debug!(
            tenant = %request.tenant.id,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "scorer completion received"
        );
        parse_scored_response(&response.text())
    }
}
