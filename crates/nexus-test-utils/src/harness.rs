// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end routing tests.
//!
//! `TestHarness` assembles a complete routing engine with mock collaborators,
//! a temp SQLite database and a cheap vault key, and starts the dispatcher.
//! `deliver()` drives a webhook through the full inbound pipeline and waits
//! for every job it spawned.

use std::sync::Arc;
use std::time::Duration;

use nexus_assistant::{AssistantSettings, Orchestrator};
use nexus_bridge::{BridgeDeps, BridgeManager, BridgeSettings, RetryPolicy};
use nexus_config::model::VaultConfig;
use nexus_core::{
    BridgeStatus, NexusError, Platform, ResponseScorer, TenantDirectory, TenantId, TenantProfile,
};
use nexus_storage::Database;
use nexus_storage::queries::{conversations, messages, webhook_events};
use nexus_storage::{Conversation, Message, MessageOrder, WebhookEventRecord};
use nexus_vault::CredentialVault;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::mock_platform::{MockAdapterFactory, MockPlatformState, valid_credentials};
use crate::mock_scorer::{MockScorer, StaticTenants};
use crate::mock_workspace::MockWorkspace;

/// Upper bound on waiting for the dispatcher in tests.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    tenants: Vec<TenantProfile>,
    with_scorer: bool,
    settings: BridgeSettings,
    start_workers: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let settings = BridgeSettings {
            workers: 2,
            queue_capacity: 64,
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
            },
            test_timeout: Duration::from_secs(2),
            ..BridgeSettings::default()
        };
        Self {
            tenants: Vec::new(),
            with_scorer: true,
            settings,
            start_workers: true,
        }
    }

    /// Registers a tenant with the directory.
    pub fn with_tenant(mut self, profile: TenantProfile) -> Self {
        self.tenants.push(profile);
        self
    }

    /// Runs without any scorer, as when no model is configured.
    pub fn without_scorer(mut self) -> Self {
        self.with_scorer = false;
        self
    }

    pub fn with_settings(mut self, f: impl FnOnce(&mut BridgeSettings)) -> Self {
        f(&mut self.settings);
        self
    }

    /// Leaves the dispatcher stopped so queued jobs pile up.
    pub fn without_workers(mut self) -> Self {
        self.start_workers = false;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, NexusError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| NexusError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let vault = Arc::new(CredentialVault::from_config(&test_vault_config())?);
        let factory = Arc::new(MockAdapterFactory::new());
        let platform = factory.state();
        let workspace = Arc::new(MockWorkspace::new());
        let scorer = Arc::new(MockScorer::new());
        let tenants: Arc<dyn TenantDirectory> = Arc::new(StaticTenants::new(self.tenants));

        let orchestrator = Orchestrator::new(
            self.with_scorer
                .then(|| Arc::clone(&scorer) as Arc<dyn ResponseScorer>),
            AssistantSettings::default(),
        );
        let (manager, receiver) = BridgeManager::new(
            BridgeDeps {
                db,
                vault,
                factory,
                workspace: Arc::clone(&workspace) as _,
                tenants,
                orchestrator,
            },
            self.settings,
        );

        let cancel = CancellationToken::new();
        let (workers, receiver) = if self.start_workers {
            (manager.spawn_workers(receiver, cancel.clone()), None)
        } else {
            (Vec::new(), Some(receiver))
        };

        Ok(TestHarness {
            manager,
            platform,
            workspace,
            scorer,
            cancel,
            workers,
            receiver,
            _temp_dir: temp_dir,
        })
    }
}

/// Vault settings with a fixed secret and the cheapest Argon2 parameters.
pub fn test_vault_config() -> VaultConfig {
    VaultConfig {
        secret: Some("nexus-test-secret".to_string()),
        kdf_memory_cost: 8,
        kdf_iterations: 1,
        kdf_parallelism: 1,
        ..VaultConfig::default()
    }
}

/// A complete routing engine with mock collaborators and temp storage.
pub struct TestHarness {
    pub manager: Arc<BridgeManager>,
    /// Shared state of every mock platform adapter.
    pub platform: Arc<MockPlatformState>,
    pub workspace: Arc<MockWorkspace>,
    pub scorer: Arc<MockScorer>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    /// Held until [`TestHarness::start_workers`] when built without workers.
    receiver: Option<nexus_bridge::JobReceiver>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn db(&self) -> &Database {
        self.manager.database()
    }

    /// Starts the dispatcher of a harness built with `without_workers`.
    pub fn start_workers(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            let workers = self.manager.spawn_workers(receiver, self.cancel.clone());
            self.workers.extend(workers);
        }
    }

    /// Runs setup, configure, test and activate with valid credentials.
    pub async fn activate_bridge(
        &self,
        tenant: &str,
        platform: Platform,
    ) -> Result<(), NexusError> {
        let tenant = TenantId::from(tenant);
        self.manager.initiate_setup(&tenant, platform).await?;
        self.manager
            .configure(&tenant, platform, valid_credentials(platform))
            .await?;
        let report = self.manager.test_connection(&tenant, platform).await?;
        if !report.ok {
            return Err(NexusError::Internal(report.diagnostic));
        }
        let bridge = self.manager.activate(&tenant, platform).await?;
        debug_assert_eq!(bridge.status, BridgeStatus::Active);
        Ok(())
    }

    /// Hands a payload to the webhook path and waits until the dispatcher
    /// is idle. Returns the stored event id.
    pub async fn deliver(
        &self,
        tenant: &str,
        platform: Platform,
        payload: serde_json::Value,
    ) -> Result<i64, NexusError> {
        let id = self
            .manager
            .handle_webhook(&TenantId::from(tenant), platform, &payload)
            .await?;
        self.settle().await;
        Ok(id)
    }

    /// Waits for the dispatcher to finish everything queued.
    pub async fn settle(&self) {
        if tokio::time::timeout(IDLE_TIMEOUT, self.manager.wait_idle())
            .await
            .is_err()
        {
            tracing::error!("dispatcher did not go idle in time");
        }
    }

    pub async fn event(&self, id: i64) -> Option<WebhookEventRecord> {
        webhook_events::get_webhook_event(self.db(), id).await.ok().flatten()
    }

    pub async fn conversations(&self, tenant: &str) -> Vec<Conversation> {
        conversations::list_conversations(self.db(), &TenantId::from(tenant), None, None)
            .await
            .unwrap_or_default()
    }

    /// Every message in a conversation, oldest first.
    pub async fn messages(&self, conversation_id: &str) -> Vec<Message> {
        messages::list_messages(self.db(), conversation_id, MessageOrder::OldestFirst, 500, None)
            .await
            .unwrap_or_default()
    }

    /// Stops the dispatcher and evicts cached adapters.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for worker in std::mem::take(&mut self.workers) {
            let _ = worker.await;
        }
        self.manager.shutdown().await;
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_platform::{MockInbound, inbound_payload};

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.conversations("acme").await.is_empty());
        assert!(harness.manager.registry().is_empty());
    }

    #[tokio::test]
    async fn activate_bridge_runs_full_lifecycle() {
        let harness = TestHarness::builder().build().await.unwrap();
        harness.activate_bridge("acme", Platform::Telegram).await.unwrap();

        let report = harness
            .manager
            .status(&TenantId::from("acme"), Platform::Telegram)
            .await
            .unwrap();
        assert_eq!(report.bridge.status, BridgeStatus::Active);
        assert!(report.bridge.room_handle.is_some());
        assert_eq!(harness.workspace.bridge_inits().await.len(), 1);
    }

    #[tokio::test]
    async fn deliver_waits_for_processing() {
        let harness = TestHarness::builder().build().await.unwrap();
        harness.activate_bridge("acme", Platform::Telegram).await.unwrap();

        let id = harness
            .deliver(
                "acme",
                Platform::Telegram,
                inbound_payload(&[MockInbound::text("u1", "hello").named("Dana")]),
            )
            .await
            .unwrap();

        assert!(harness.event(id).await.unwrap().processed);
        assert_eq!(harness.conversations("acme").await.len(), 1);
    }

    #[tokio::test]
    async fn temp_db_is_unique_per_harness() {
        let h1 = TestHarness::builder().build().await.unwrap();
        let h2 = TestHarness::builder().build().await.unwrap();
        h1.activate_bridge("acme", Platform::Signal).await.unwrap();

        assert_eq!(h1.manager.list(&TenantId::from("acme")).await.unwrap().len(), 1);
        assert!(h2.manager.list(&TenantId::from("acme")).await.unwrap().is_empty());
    }
}
