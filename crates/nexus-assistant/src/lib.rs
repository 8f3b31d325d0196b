// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI response orchestration.
//!
//! [`Orchestrator::evaluate`] asks the scorer for a suggested reply and
//! decides what to do with it. It never sends or stores anything itself;
//! the routing engine applies the returned [`AssistDecision`].
//!
//! A reply is auto-sent only when the tenant allows it, the confidence
//! meets the tenant threshold, and no escalation keyword appears in the
//! inbound text.

pub mod heuristics;

use std::sync::Arc;
use std::time::Duration;

use nexus_config::model::AssistantConfig;
use nexus_core::{
    AiAnnotation, HistoryTurn, Platform, ResponseScorer, ScoreRequest, TenantProfile,
};
use serde::Serialize;
use strum::{Display, IntoStaticStr};
use tracing::{debug, info, warn};

use crate::heuristics::{fallback_confidence, find_escalation_keyword};

const MAX_HISTORY: usize = 20;

/// Tunables taken from `[assistant]`.
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    /// Prior messages handed to the scorer, clamped to `1..=20`.
    pub history_limit: usize,
    pub scorer_timeout: Duration,
    pub default_escalation_keywords: Vec<String>,
}

impl From<&AssistantConfig> for AssistantSettings {
    fn from(config: &AssistantConfig) -> Self {
        Self {
            history_limit: config.history_limit.clamp(1, MAX_HISTORY),
            scorer_timeout: Duration::from_secs(config.scorer_timeout_secs),
            default_escalation_keywords: config.default_escalation_keywords.clone(),
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self::from(&AssistantConfig::default())
    }
}

/// What the routing engine should do with a scored inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssistAction {
    /// Send the suggestion to the customer.
    AutoSend,
    /// Keep the suggestion for an agent; nothing is sent.
    RecordOnly,
    /// Keep the suggestion and flag the conversation for a human.
    Escalate,
    /// The scorer produced nothing usable.
    NoSuggestion,
    /// AI is disabled or the tenant is unknown.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EscalationReason {
    Keyword { keyword: String },
    RequiresHuman,
    LowConfidence { confidence: f64, threshold: f64 },
}

impl std::fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword { keyword } => write!(f, "escalation keyword \"{keyword}\""),
            Self::RequiresHuman => f.write_str("scorer requested a human"),
            Self::LowConfidence {
                confidence,
                threshold,
            } => write!(f, "confidence {confidence:.2} below threshold {threshold:.2}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub text: String,
    /// Scorer confidence, or the heuristic fallback when it reported none.
    pub confidence: f64,
    pub intent: Option<String>,
    pub requires_human: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistDecision {
    pub action: AssistAction,
    pub suggestion: Option<Suggestion>,
    pub escalation: Option<EscalationReason>,
}

impl AssistDecision {
    fn skipped() -> Self {
        Self {
            action: AssistAction::Skipped,
            suggestion: None,
            escalation: None,
        }
    }

    /// Text to send, present only for [`AssistAction::AutoSend`].
    pub fn reply(&self) -> Option<&str> {
        match (self.action, &self.suggestion) {
            (AssistAction::AutoSend, Some(s)) => Some(&s.text),
            _ => None,
        }
    }

    /// Annotation stored on the inbound message.
    ///
    /// Skipped decisions are annotated too, which marks the message as
    /// evaluated so it is not picked up for scoring again.
    pub fn annotation(&self) -> AiAnnotation {
        AiAnnotation {
            text: self.suggestion.as_ref().map(|s| s.text.clone()),
            confidence: self.suggestion.as_ref().map_or(0.0, |s| s.confidence),
            intent: self.suggestion.as_ref().and_then(|s| s.intent.clone()),
            escalate: self.escalation.is_some(),
            action: self.action.to_string(),
        }
    }
}

/// One inbound message to evaluate.
#[derive(Debug, Clone)]
pub struct AssistRequest {
    /// `None` when the tenant directory does not know the tenant.
    pub tenant: Option<TenantProfile>,
    pub platform: Platform,
    pub customer_name: Option<String>,
    pub message: String,
    /// Oldest first, already limited to [`AssistantSettings::history_limit`].
    pub history: Vec<HistoryTurn>,
}

/// Confidence-gated auto-response.
pub struct Orchestrator {
    scorer: Option<Arc<dyn ResponseScorer>>,
    settings: AssistantSettings,
}

impl Orchestrator {
    /// `scorer` is `None` when no model is configured; keyword escalation
    /// still applies in that case.
    pub fn new(scorer: Option<Arc<dyn ResponseScorer>>, settings: AssistantSettings) -> Self {
        Self { scorer, settings }
    }

    pub fn history_limit(&self) -> usize {
        self.settings.history_limit
    }

    pub async fn evaluate(&self, request: AssistRequest) -> AssistDecision {
        let Some(tenant) = request.tenant.clone().filter(|t| t.ai_enabled) else {
            debug!(platform = %request.platform, "AI assistance skipped for tenant");
            return AssistDecision::skipped();
        };

        let keywords = if tenant.escalation_keywords.is_empty() {
            &self.settings.default_escalation_keywords
        } else {
            &tenant.escalation_keywords
        };
        let keyword = find_escalation_keyword(&request.message, keywords).map(String::from);

        let suggestion = self.suggest(&tenant, request).await;
        let decision = decide(&tenant, suggestion, keyword);
        info!(
            tenant = %tenant.id,
            action = %decision.action,
            confidence = decision.suggestion.as_ref().map(|s| s.confidence),
            escalation = decision.escalation.as_ref().map(|r| r.to_string()),
            "AI decision"
        );
        decision
    }

    async fn suggest(&self, tenant: &TenantProfile, request: AssistRequest) -> Option<Suggestion> {
        let scorer = self.scorer.as_ref()?;
        let mut history = request.history;
        if history.len() > self.settings.history_limit {
            history.drain(..history.len() - self.settings.history_limit);
        }
        let score_request = ScoreRequest {
            tenant: tenant.clone(),
            platform: request.platform,
            customer_name: request.customer_name,
            message: request.message,
            history,
        };

        let scored =
            match tokio::time::timeout(self.settings.scorer_timeout, scorer.score(&score_request))
                .await
            {
                Ok(Ok(scored)) => scored,
                Ok(Err(e)) => {
                    warn!(tenant = %tenant.id, error = %e, "scorer failed; no suggestion");
                    return None;
                }
                Err(_) => {
                    warn!(
                        tenant = %tenant.id,
                        timeout = ?self.settings.scorer_timeout,
                        "scorer timed out; no suggestion"
                    );
                    return None;
                }
            };

        let text = scored.text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        let confidence = scored
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or_else(|| fallback_confidence(&text));
        Some(Suggestion {
            text,
            confidence,
            intent: scored.intent,
            requires_human: scored.requires_human,
        })
    }
}

/// The gating rules, separated from scorer I/O.
///
/// Precedence for escalation is keyword, then the scorer's own request for
/// a human, then low confidence. Low confidence only escalates for tenants
/// that allow auto-respond, since for everyone else nothing would have been
/// sent anyway.
pub fn decide(
    tenant: &TenantProfile,
    suggestion: Option<Suggestion>,
    keyword: Option<String>,
) -> AssistDecision {
    let escalate = |suggestion, reason| AssistDecision {
        action: AssistAction::Escalate,
        suggestion,
        escalation: Some(reason),
    };

    let Some(s) = suggestion else {
        return match keyword {
            Some(keyword) => escalate(None, EscalationReason::Keyword { keyword }),
            None => AssistDecision {
                action: AssistAction::NoSuggestion,
                suggestion: None,
                escalation: None,
            },
        };
    };

    if let Some(keyword) = keyword {
        return escalate(Some(s), EscalationReason::Keyword { keyword });
    }
    if s.requires_human {
        return escalate(Some(s), EscalationReason::RequiresHuman);
    }
    let threshold = tenant.confidence_threshold;
    if s.confidence < threshold {
        if tenant.auto_respond {
            let confidence = s.confidence;
            return escalate(
                Some(s),
                EscalationReason::LowConfidence {
                    confidence,
                    threshold,
                },
            );
        }
        return AssistDecision {
            action: AssistAction::RecordOnly,
            suggestion: Some(s),
            escalation: None,
        };
    }

    AssistDecision {
        action: if tenant.auto_respond {
            AssistAction::AutoSend
        } else {
            AssistAction::RecordOnly
        },
        suggestion: Some(s),
        escalation: None,
    }
}
