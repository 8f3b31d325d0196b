// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AI scorer seam: a black box returning suggested text and confidence.

use async_trait::async_trait;

use crate::error::NexusError;
use crate::types::{Direction, Platform, TenantProfile};

/// One prior message handed to the scorer as context.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryTurn {
    pub direction: Direction,
    pub content: String,
}

/// Everything the scorer sees. Nothing is retained between calls.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    pub tenant: TenantProfile,
    pub platform: Platform,
    pub customer_name: Option<String>,
    pub message: String,
    /// Oldest first.
    pub history: Vec<HistoryTurn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResponse {
    pub text: String,
    /// `None` when the model did not report a confidence.
    pub confidence: Option<f64>,
    pub intent: Option<String>,
    pub requires_human: bool,
}

#[async_trait]
pub trait ResponseScorer: Send + Sync + 'static {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoredResponse, NexusError>;
}
