// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock AI scorer and a fixed tenant directory.
//!
//! `MockScorer` pops pre-configured replies from a FIFO queue and records
//! every request so tests can assert on the history it was given.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use nexus_core::{
    NexusError, ResponseScorer, ScoreRequest, ScoredResponse, TenantDirectory, TenantId,
    TenantProfile,
};
use tokio::sync::Mutex;

enum Scripted {
    Reply(ScoredResponse),
    Fail,
}

pub struct MockScorer {
    queue: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ScoreRequest>>,
}

impl MockScorer {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a reply with the given confidence.
    pub async fn push_reply(&self, text: &str, confidence: f64) {
        self.push(ScoredResponse {
            text: text.to_string(),
            confidence: Some(confidence),
            intent: Some("general".to_string()),
            requires_human: false,
        })
        .await;
    }

    pub async fn push(&self, response: ScoredResponse) {
        self.queue.lock().await.push_back(Scripted::Reply(response));
    }

    /// Queues a transient failure.
    pub async fn push_failure(&self) {
        self.queue.lock().await.push_back(Scripted::Fail);
    }

    pub async fn requests(&self) -> Vec<ScoreRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseScorer for MockScorer {
    async fn score(&self, request: &ScoreRequest) -> Result<ScoredResponse, NexusError> {
        self.requests.lock().await.push(request.clone());
        match self.queue.lock().await.pop_front() {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail) => Err(NexusError::transient("mock scorer unavailable")),
            None => Err(NexusError::permanent("mock scorer has no scripted reply")),
        }
    }
}

/// Tenant directory backed by a fixed map.
#[derive(Default)]
pub struct StaticTenants {
    tenants: HashMap<TenantId, TenantProfile>,
}

impl StaticTenants {
    pub fn new(profiles: impl IntoIterator<Item = TenantProfile>) -> Self {
        Self {
            tenants: profiles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }
}

#[async_trait]
impl TenantDirectory for StaticTenants {
    async fn tenant(&self, id: &TenantId) -> Result<Option<TenantProfile>, NexusError> {
        Ok(self.tenants.get(id).cloned())
    }
}
