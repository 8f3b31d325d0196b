// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge lifecycle and message routing.
//!
//! [`BridgeManager`] owns the per-bridge state machine
//! (`pending → configuring → configured → active ⇄ error`, with `inactive`
//! reachable by deactivation), the inbound path from stored webhook event to
//! conversation, workspace room and AI annotation, and the outbound send path.
//!
//! Lifecycle operations for one bridge are serialized by a per-key mutex so
//! two operators hitting "test" at once run a single connection test.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use nexus_assistant::{AssistAction, AssistDecision, AssistRequest, Orchestrator};
use nexus_config::model::BridgeConfig;
use nexus_core::{
    AdapterFactory, BridgeStatus, ConnectionTest, ConversationStatus, Credentials, Direction,
    HistoryTurn, InboundEvent, MessageType, NexusError, Platform, TenantDirectory, TenantId,
    WorkspaceSink,
};
use nexus_storage::queries::{bridges, conversations, messages, webhook_events};
use nexus_storage::{
    BridgeRecord, Database, Message, MessageOrder, NewMessage, Participant, WebhookEventRecord,
};
use nexus_vault::CredentialVault;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatch::{AssistJob, Job, JobHandler, JobQueue, JobReceiver, spawn_workers};
use crate::registry::{AdapterRegistry, BridgeKey};
use crate::retry::RetryPolicy;

/// Webhook events listed by [`BridgeManager::status`].
const RECENT_EVENT_LIMIT: u32 = 10;

/// Routing engine tunables.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub replay_interval: Duration,
    pub max_webhook_retries: u32,
    pub retry: RetryPolicy,
    pub test_timeout: Duration,
    /// Prefix for webhook URLs in setup instructions, e.g. `https://bridge.example.com`.
    pub public_base_url: Option<String>,
}

impl From<&BridgeConfig> for BridgeSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            workers: config.workers,
            queue_capacity: config.queue_capacity,
            replay_interval: Duration::from_secs(config.replay_interval_secs.max(1)),
            max_webhook_retries: config.max_webhook_retries,
            retry: RetryPolicy::from(config),
            test_timeout: Duration::from_secs(config.test_timeout_secs),
            public_base_url: None,
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

impl BridgeSettings {
    pub fn with_public_base_url(mut self, url: Option<String>) -> Self {
        self.public_base_url = url.map(|u| u.trim_end_matches('/').to_string());
        self
    }
}

/// Collaborators the manager routes between.
pub struct BridgeDeps {
    pub db: Database,
    pub vault: Arc<CredentialVault>,
    pub factory: Arc<dyn AdapterFactory>,
    pub workspace: Arc<dyn WorkspaceSink>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub orchestrator: Orchestrator,
}

/// What an operator needs to finish setting up a bridge.
#[derive(Debug, Clone, Serialize)]
pub struct SetupInstructions {
    pub bridge_id: String,
    pub tenant_id: TenantId,
    pub platform: Platform,
    pub status: BridgeStatus,
    pub required_fields: Vec<&'static str>,
    pub optional_fields: Vec<&'static str>,
    pub webhook_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// The platform performs a GET challenge against the webhook URL using
    /// the configured `webhook_verify_token`.
    pub requires_verification: bool,
}

/// Outcome of a setup-time connection test.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub ok: bool,
    pub diagnostic: String,
    pub status: BridgeStatus,
}

/// A bridge plus its latest webhook traffic.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatusReport {
    pub bridge: BridgeRecord,
    pub recent_events: Vec<WebhookEventRecord>,
}

/// An outbound send request.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub tenant: TenantId,
    pub platform: Platform,
    pub external_id: String,
    pub content: String,
    pub message_type: MessageType,
    /// Merged into the stored message's metadata.
    pub metadata: serde_json::Value,
}

impl OutboundMessage {
    pub fn text(
        tenant: impl Into<TenantId>,
        platform: Platform,
        external_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            platform,
            external_id: external_id.into(),
            content: content.into(),
            message_type: MessageType::Text,
            metadata: json!({}),
        }
    }
}

/// Routing engine for every tenant's bridges.
pub struct BridgeManager {
    db: Database,
    vault: Arc<CredentialVault>,
    factory: Arc<dyn AdapterFactory>,
    registry: AdapterRegistry,
    workspace: Arc<dyn WorkspaceSink>,
    tenants: Arc<dyn TenantDirectory>,
    orchestrator: Orchestrator,
    queue: JobQueue,
    settings: BridgeSettings,
    lifecycle: DashMap<BridgeKey, Arc<Mutex<()>>>,
    in_flight: DashSet<i64>,
    /// Message ids with an AI job queued or running.
    assisting: DashSet<String>,
}

impl BridgeManager {
    /// Builds the manager. Inbound jobs queue up until
    /// [`BridgeManager::spawn_workers`] is given the returned receiver.
    pub fn new(deps: BridgeDeps, settings: BridgeSettings) -> (Arc<Self>, JobReceiver) {
        let (queue, receiver) = JobQueue::new(settings.queue_capacity);
        let registry = AdapterRegistry::new(
            deps.db.clone(),
            Arc::clone(&deps.vault),
            Arc::clone(&deps.factory),
        );
        let manager = Arc::new(Self {
            db: deps.db,
            vault: deps.vault,
            factory: deps.factory,
            registry,
            workspace: deps.workspace,
            tenants: deps.tenants,
            orchestrator: deps.orchestrator,
            queue,
            settings,
            lifecycle: DashMap::new(),
            in_flight: DashSet::new(),
            assisting: DashSet::new(),
        });
        (manager, receiver)
    }

    pub fn spawn_workers(
        self: &Arc<Self>,
        receiver: JobReceiver,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let handler: Arc<dyn JobHandler> = Arc::clone(self) as Arc<dyn JobHandler>;
        spawn_workers(receiver, handler, self.settings.workers, cancel)
    }

    /// Re-submits unprocessed events now and then every replay interval.
    pub fn spawn_replay_loop(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.settings.replay_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = manager.replay_pending().await {
                            warn!(error = %e, "webhook replay sweep failed");
                        }
                    }
                }
            }
            debug!("replay loop stopped");
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Waits until the dispatcher has nothing queued or running.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Evicts every cached adapter.
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
        info!("bridge manager shut down");
    }

    async fn lock_bridge(&self, tenant: &TenantId, platform: Platform) -> OwnedMutexGuard<()> {
        let lock = self
            .lifecycle
            .entry((tenant.clone(), platform))
            .or_default()
            .value()
            .clone();
        lock.lock_owned().await
    }

    async fn require_bridge(
        &self,
        tenant: &TenantId,
        platform: Platform,
    ) -> Result<BridgeRecord, NexusError> {
        bridges::get_bridge(&self.db, tenant, platform)
            .await?
            .ok_or_else(|| NexusError::not_found("bridge", format!("{tenant}/{platform}")))
    }

    async fn transition(
        &self,
        bridge: &BridgeRecord,
        next: BridgeStatus,
        error_message: Option<&str>,
    ) -> Result<(), NexusError> {
        if !bridge.status.can_transition_to(next) {
            return Err(NexusError::Config(format!(
                "bridge {}/{} cannot move from {} to {next}",
                bridge.tenant_id, bridge.platform, bridge.status
            )));
        }
        bridges::update_bridge_status(&self.db, &bridge.id, next, error_message).await?;
        info!(
            tenant = %bridge.tenant_id,
            platform = %bridge.platform,
            from = %bridge.status,
            to = %next,
            "bridge status changed"
        );
        Ok(())
    }

    // --- Lifecycle -------------------------------------------------------

    /// Creates the bridge row if needed and returns setup instructions.
    pub async fn initiate_setup(
        &self,
        tenant: &TenantId,
        platform: Platform,
    ) -> Result<SetupInstructions, NexusError> {
        let _guard = self.lock_bridge(tenant, platform).await;
        let (bridge, created) = bridges::get_or_create_bridge(&self.db, tenant, platform).await?;
        if bridge.status == BridgeStatus::Active {
            return Err(NexusError::Config(format!(
                "bridge {tenant}/{platform} is already active; deactivate it before running setup again"
            )));
        }
        if created {
            info!(tenant = %tenant, platform = %platform, "bridge setup initiated");
        }

        let webhook_url = self
            .settings
            .public_base_url
            .as_ref()
            .map(|base| format!("{base}{}", bridge.webhook_path));
        Ok(SetupInstructions {
            bridge_id: bridge.id,
            tenant_id: bridge.tenant_id,
            platform,
            status: bridge.status,
            required_fields: platform.required_credentials().to_vec(),
            optional_fields: platform.optional_credentials().to_vec(),
            webhook_path: bridge.webhook_path,
            webhook_url,
            requires_verification: platform.requires_verification_handshake(),
        })
    }

    /// Validates, encrypts and stores credentials. Leaves the bridge in
    /// `configuring` until a connection test passes.
    pub async fn configure(
        &self,
        tenant: &TenantId,
        platform: Platform,
        credentials: Credentials,
    ) -> Result<BridgeRecord, NexusError> {
        let _guard = self.lock_bridge(tenant, platform).await;
        let bridge = self.require_bridge(tenant, platform).await?;
        if bridge.status == BridgeStatus::Active {
            return Err(NexusError::Config(format!(
                "bridge {tenant}/{platform} is active; deactivate it before changing credentials"
            )));
        }
        credentials.validate_for(platform)?;

        let blob = self.vault.encrypt(tenant, platform, &credentials)?;
        self.transition(&bridge, BridgeStatus::Configuring, None).await?;
        bridges::store_credentials(
            &self.db,
            &bridge.id,
            blob.into_bytes(),
            self.vault.encryption_version(),
            &credentials.public_identifiers(platform),
        )
        .await?;
        self.registry.evict(tenant, platform).await;
        info!(tenant = %tenant, platform = %platform, fields = credentials.len(), "bridge credentials stored");

        self.require_bridge(tenant, platform).await
    }

    /// Builds a fresh adapter and runs its connection test.
    ///
    /// Success moves the bridge to `configured`, or straight back to
    /// `active` when it was in `error` with a workspace room already linked.
    /// Failure moves it to `error` with the diagnostic.
    pub async fn test_connection(
        &self,
        tenant: &TenantId,
        platform: Platform,
    ) -> Result<ConnectionReport, NexusError> {
        let _guard = self.lock_bridge(tenant, platform).await;
        let bridge = self.require_bridge(tenant, platform).await?;
        if !matches!(
            bridge.status,
            BridgeStatus::Configuring | BridgeStatus::Configured | BridgeStatus::Error
        ) {
            return Err(NexusError::Config(format!(
                "bridge {tenant}/{platform} is {}; configure credentials before testing",
                bridge.status
            )));
        }
        if !bridge.has_credentials() {
            return Err(NexusError::Config(format!(
                "bridge {tenant}/{platform} has no stored credentials"
            )));
        }

        self.registry.evict(tenant, platform).await;
        let outcome = match self.registry.get_or_create(tenant, platform).await {
            Ok(adapter) => {
                match tokio::time::timeout(self.settings.test_timeout, adapter.test_connection())
                    .await
                {
                    Ok(result) => result,
                    Err(_) => ConnectionTest::failed(format!(
                        "connection test timed out after {}s",
                        self.settings.test_timeout.as_secs()
                    )),
                }
            }
            Err(e @ NexusError::CredentialUnavailable { .. }) => return Err(e),
            Err(e) => ConnectionTest::failed(e.to_string()),
        };

        let status = if outcome.ok {
            let next = if bridge.status == BridgeStatus::Error && bridge.room_handle.is_some() {
                BridgeStatus::Active
            } else {
                BridgeStatus::Configured
            };
            self.transition(&bridge, next, None).await?;
            if next == BridgeStatus::Active {
                bridges::touch_last_sync(&self.db, &bridge.id).await?;
            }
            next
        } else {
            self.registry.evict(tenant, platform).await;
            self.transition(&bridge, BridgeStatus::Error, Some(&outcome.diagnostic))
                .await?;
            BridgeStatus::Error
        };

        info!(tenant = %tenant, platform = %platform, ok = outcome.ok, status = %status, "connection test finished");
        Ok(ConnectionReport {
            ok: outcome.ok,
            diagnostic: outcome.diagnostic,
            status,
        })
    }

    /// Links the bridge to the workspace and starts routing traffic.
    pub async fn activate(
        &self,
        tenant: &TenantId,
        platform: Platform,
    ) -> Result<BridgeRecord, NexusError> {
        let _guard = self.lock_bridge(tenant, platform).await;
        let bridge = self.require_bridge(tenant, platform).await?;
        let allowed = match bridge.status {
            BridgeStatus::Configured => true,
            BridgeStatus::Inactive => bridge.has_credentials(),
            _ => false,
        };
        if !allowed {
            return Err(NexusError::Config(format!(
                "bridge {tenant}/{platform} is {}; it must pass a connection test before activation",
                bridge.status
            )));
        }

        let room = self
            .workspace
            .initialize_tenant_bridge(tenant, platform, &bridge.public_ids)
            .await?;
        bridges::mark_activated(&self.db, &bridge.id, &room).await?;
        info!(tenant = %tenant, platform = %platform, room = %room, "bridge activated");

        self.require_bridge(tenant, platform).await
    }

    /// Stops all traffic for the bridge and drops its adapter.
    pub async fn deactivate(
        &self,
        tenant: &TenantId,
        platform: Platform,
    ) -> Result<BridgeRecord, NexusError> {
        let _guard = self.lock_bridge(tenant, platform).await;
        let bridge = self.require_bridge(tenant, platform).await?;
        self.transition(&bridge, BridgeStatus::Inactive, None).await?;
        self.registry.evict(tenant, platform).await;
        self.require_bridge(tenant, platform).await
    }

    pub async fn status(
        &self,
        tenant: &TenantId,
        platform: Platform,
    ) -> Result<BridgeStatusReport, NexusError> {
        let bridge = self.require_bridge(tenant, platform).await?;
        let recent_events =
            webhook_events::recent_events(&self.db, &bridge.id, RECENT_EVENT_LIMIT).await?;
        Ok(BridgeStatusReport {
            bridge,
            recent_events,
        })
    }

    pub async fn list(&self, tenant: &TenantId) -> Result<Vec<BridgeRecord>, NexusError> {
        bridges::list_bridges(&self.db, tenant).await
    }

    /// Decrypted credentials for a bridge. Used by the webhook verification
    /// handshake.
    pub async fn credentials(
        &self,
        tenant: &TenantId,
        platform: Platform,
    ) -> Result<Credentials, NexusError> {
        let bridge = self.require_bridge(tenant, platform).await?;
        let blob = bridge.credentials.ok_or_else(|| {
            NexusError::Config(format!("bridge {tenant}/{platform} has no stored credentials"))
        })?;
        self.vault
            .decrypt(&nexus_vault::EncryptedBlob::from_bytes(blob))
    }

    // --- Inbound ---------------------------------------------------------

    /// Stores a raw webhook payload and queues it for processing.
    ///
    /// Returns the stored event id. Processing happens on the dispatcher; a
    /// full queue leaves the event for the replay sweep.
    pub async fn handle_webhook(
        &self,
        tenant: &TenantId,
        platform: Platform,
        payload: &serde_json::Value,
    ) -> Result<i64, NexusError> {
        let bridge = self.require_bridge(tenant, platform).await?;
        if !bridge.status.accepts_inbound() {
            nexus_prometheus::record_webhook(platform.as_ref(), "rejected");
            return Err(NexusError::Config(format!(
                "bridge {tenant}/{platform} is inactive"
            )));
        }

        let event_id =
            webhook_events::insert_webhook_event(&self.db, &bridge.id, tenant, platform, payload)
                .await?;
        nexus_prometheus::record_webhook(platform.as_ref(), "received");
        debug!(tenant = %tenant, platform = %platform, event_id, "webhook event stored");

        self.submit_event(event_id);
        Ok(event_id)
    }

    fn submit_event(&self, event_id: i64) -> bool {
        if !self.in_flight.insert(event_id) {
            return false;
        }
        let queued = self.queue.try_submit(Job::ProcessWebhook { event_id });
        if !queued {
            self.in_flight.remove(&event_id);
        }
        queued
    }

    /// Queues an AI job unless one is already queued or running for the
    /// message. Returns `false` only when the queue refused it.
    fn submit_assist(&self, job: AssistJob) -> bool {
        let message_id = job.message_id.clone();
        if !self.assisting.insert(message_id.clone()) {
            return true;
        }
        let queued = self.queue.try_submit(Job::Assist(job));
        if !queued {
            self.assisting.remove(&message_id);
        }
        queued
    }

    /// Re-submits unprocessed events under the retry ceiling, then AI jobs
    /// for forwarded messages that were never scored. Returns how many jobs
    /// were queued.
    pub async fn replay_pending(&self) -> Result<usize, NexusError> {
        let limit = u32::try_from(self.queue.capacity()).unwrap_or(u32::MAX);
        let pending =
            webhook_events::list_pending_events(&self.db, self.settings.max_webhook_retries, limit)
                .await?;
        let mut queued = 0;
        let mut full = false;
        for event in pending {
            if self.in_flight.contains(&event.id) {
                continue;
            }
            if !self.submit_event(event.id) {
                full = true;
                break;
            }
            queued += 1;
        }
        if queued > 0 {
            info!(queued, "replaying unprocessed webhook events");
        }
        if !full {
            queued += self.replay_unscored(limit).await?;
        }
        Ok(queued)
    }

    async fn replay_unscored(&self, limit: u32) -> Result<usize, NexusError> {
        let unscored = messages::list_unscored_inbound(&self.db, limit).await?;
        let mut queued = 0;
        for message in unscored {
            if self.assisting.contains(&message.id) {
                continue;
            }
            let Some(conversation) =
                conversations::get_conversation(&self.db, &message.conversation_id).await?
            else {
                warn!(message_id = %message.id, "unscored message has no conversation");
                continue;
            };
            let job = AssistJob {
                tenant: conversation.tenant_id,
                platform: conversation.platform,
                conversation_id: conversation.id,
                message_id: message.id,
                external_id: conversation.external_id,
                customer_name: conversation.participant_name,
                content: message.content,
            };
            if !self.submit_assist(job) {
                break;
            }
            queued += 1;
        }
        if queued > 0 {
            info!(queued, "replaying unscored inbound messages");
        }
        Ok(queued)
    }

    /// Normalizes and routes one stored webhook event, then records the
    /// outcome on the event row.
    pub async fn process_webhook_event(&self, event_id: i64) -> Result<(), NexusError> {
        let Some(event) = webhook_events::get_webhook_event(&self.db, event_id).await? else {
            warn!(event_id, "webhook event vanished before processing");
            return Ok(());
        };
        if event.processed {
            debug!(event_id, "webhook event already processed");
            return Ok(());
        }

        let platform = event.platform;
        match self.route_event(&event).await {
            Ok(routed) => {
                webhook_events::mark_event_processed(&self.db, event_id).await?;
                nexus_prometheus::record_webhook(platform.as_ref(), "processed");
                debug!(event_id, routed, "webhook event processed");
                Ok(())
            }
            Err(e) => {
                let retryable = e.is_retryable();
                warn!(event_id, platform = %platform, error = %e, retryable, "webhook event failed");
                webhook_events::mark_event_failed(
                    &self.db,
                    event_id,
                    &e.to_string(),
                    retryable,
                    self.settings.max_webhook_retries,
                )
                .await?;
                nexus_prometheus::record_webhook(platform.as_ref(), "failed");
                Err(e)
            }
        }
    }

    async fn route_event(&self, event: &WebhookEventRecord) -> Result<usize, NexusError> {
        let bridge = self.require_bridge(&event.tenant_id, event.platform).await?;
        if !bridge.status.accepts_inbound() {
            return Err(NexusError::Config(format!(
                "bridge {}/{} is inactive",
                bridge.tenant_id, bridge.platform
            )));
        }

        let parsed = self.factory.parse_webhook(event.platform, &event.payload)?;
        webhook_events::set_event_type(&self.db, event.id, parsed.event_type()).await?;
        if parsed.dropped > 0 || parsed.skipped > 0 {
            debug!(
                event_id = event.id,
                dropped = parsed.dropped,
                skipped = parsed.skipped,
                "webhook items not routed"
            );
        }

        let count = parsed.events.len();
        for inbound in parsed.events {
            self.route_inbound(&bridge, event.id, inbound).await?;
        }
        if count > 0 {
            bridges::touch_last_sync(&self.db, &bridge.id).await?;
        }
        Ok(count)
    }

    async fn route_inbound(
        &self,
        bridge: &BridgeRecord,
        event_id: i64,
        inbound: InboundEvent,
    ) -> Result<(), NexusError> {
        let tenant = &bridge.tenant_id;
        let platform = bridge.platform;
        let conversation = conversations::upsert_conversation(
            &self.db,
            tenant,
            platform,
            &inbound.external_sender_id,
            &Participant::named(inbound.sender_display_name.clone()),
        )
        .await?;

        let mut new = NewMessage::new(
            conversation.id.clone(),
            Direction::Inbound,
            inbound.message_type,
            inbound.content.clone(),
        );
        new.sender = json!({
            "id": inbound.external_sender_id,
            "name": inbound.sender_display_name,
        });
        new.attachments = inbound.raw_attachments;
        new.platform_message_id = inbound.platform_message_id;
        new.webhook_event_id = Some(event_id);
        new.platform_timestamp = inbound.platform_timestamp;

        let outcome = messages::append_message(&self.db, new).await?;
        let duplicate = outcome.is_duplicate();
        let message = outcome.into_message();
        if duplicate && message.is_processed {
            debug!(message_id = %message.id, "duplicate inbound message already forwarded");
            return Ok(());
        }
        if !duplicate {
            nexus_prometheus::record_inbound_message(platform.as_ref());
        }

        let display = conversation
            .participant_name
            .clone()
            .unwrap_or_else(|| inbound.external_sender_id.clone());
        let summary = format!(
            "[{}] {display} ({}): {}",
            platform.label(),
            inbound.external_sender_id,
            message.content
        );
        let room = self
            .workspace
            .get_or_create_room(tenant, platform, &inbound.external_sender_id)
            .await?;
        self.workspace.send_to_room(&room, &summary).await?;
        messages::mark_message_processed(&self.db, &message.id).await?;

        if message.ai_annotation.is_none() {
            let job = AssistJob {
                tenant: tenant.clone(),
                platform,
                conversation_id: conversation.id,
                message_id: message.id,
                external_id: inbound.external_sender_id,
                customer_name: conversation.participant_name,
                content: message.content,
            };
            if !self.submit_assist(job) {
                warn!(tenant = %tenant, platform = %platform, "dispatch queue full, AI job left for the replay sweep");
            }
        }
        Ok(())
    }

    /// Scores an inbound message and acts on the decision.
    pub async fn run_assist(&self, job: AssistJob) -> Result<AssistDecision, NexusError> {
        let tenant = match self.tenants.tenant(&job.tenant).await {
            Ok(tenant) => tenant,
            Err(e) => {
                warn!(tenant = %job.tenant, error = %e, "tenant lookup failed, AI skipped");
                None
            }
        };

        let history = self.history_for(&job).await?;
        let decision = self
            .orchestrator
            .evaluate(AssistRequest {
                tenant,
                platform: job.platform,
                customer_name: job.customer_name.clone(),
                message: job.content.clone(),
                history,
            })
            .await;
        nexus_prometheus::record_ai_decision(decision.action.into());

        messages::set_message_annotation(&self.db, &job.message_id, &decision.annotation()).await?;

        match decision.action {
            AssistAction::AutoSend => {
                if let Some((reply, suggestion)) = decision.reply().zip(decision.suggestion.as_ref())
                {
                    let outbound = OutboundMessage {
                        tenant: job.tenant.clone(),
                        platform: job.platform,
                        external_id: job.external_id.clone(),
                        content: reply.to_string(),
                        message_type: MessageType::Text,
                        metadata: json!({
                            "ai_generated": true,
                            "confidence": suggestion.confidence,
                            "in_reply_to": job.message_id,
                        }),
                    };
                    if let Err(e) = self.send_message_with_retry(outbound).await {
                        warn!(tenant = %job.tenant, platform = %job.platform, error = %e, "AI auto-response not delivered");
                    }
                }
            }
            AssistAction::Escalate => {
                conversations::set_conversation_status(
                    &self.db,
                    &job.conversation_id,
                    ConversationStatus::Escalated,
                )
                .await?;
                let reason = decision
                    .escalation
                    .as_ref()
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "escalated".to_string());
                conversations::merge_conversation_metadata(
                    &self.db,
                    &job.conversation_id,
                    &json!({
                        "escalation_reason": reason,
                        "escalated_at": chrono::Utc::now().to_rfc3339(),
                    }),
                )
                .await?;
                info!(tenant = %job.tenant, conversation = %job.conversation_id, reason = %reason, "conversation escalated");
            }
            AssistAction::RecordOnly | AssistAction::NoSuggestion | AssistAction::Skipped => {}
        }
        Ok(decision)
    }

    /// Prior turns for the scorer, oldest first, excluding the message itself.
    async fn history_for(&self, job: &AssistJob) -> Result<Vec<HistoryTurn>, NexusError> {
        let limit = self.orchestrator.history_limit();
        let fetch = u32::try_from(limit + 1).unwrap_or(u32::MAX);
        let recent = messages::list_messages(
            &self.db,
            &job.conversation_id,
            MessageOrder::NewestFirst,
            fetch,
            None,
        )
        .await?;
        let mut turns: Vec<HistoryTurn> = recent
            .into_iter()
            .filter(|m| m.id != job.message_id)
            .take(limit)
            .map(|m| HistoryTurn {
                direction: m.direction,
                content: m.content,
            })
            .collect();
        turns.reverse();
        Ok(turns)
    }

    // --- Outbound --------------------------------------------------------

    /// Sends one message through the bridge's adapter and stores it.
    ///
    /// An authentication failure moves the bridge to `error` and evicts its
    /// adapter. Other failures leave the bridge untouched and are returned
    /// with their kind so the caller can decide whether to retry.
    pub async fn send_message(&self, request: OutboundMessage) -> Result<Message, NexusError> {
        let tenant = &request.tenant;
        let platform = request.platform;
        let bridge = self.require_bridge(tenant, platform).await?;
        if bridge.status != BridgeStatus::Active {
            return Err(NexusError::Config(format!(
                "bridge {tenant}/{platform} is {}, not active",
                bridge.status
            )));
        }

        let adapter = self.registry.get_or_create(tenant, platform).await?;
        let started = Instant::now();
        let sent = adapter
            .send_message(&request.external_id, &request.content, request.message_type)
            .await;
        nexus_prometheus::record_send_latency(platform.as_ref(), started.elapsed().as_secs_f64());

        let platform_message_id = match sent {
            Ok(id) => id,
            Err(e) => {
                nexus_prometheus::record_outbound(platform.as_ref(), e.kind().as_ref());
                if matches!(e, NexusError::Auth { .. }) {
                    error!(tenant = %tenant, platform = %platform, error = %e, "platform rejected credentials");
                    self.mark_error(&bridge, &e.to_string()).await;
                }
                return Err(e);
            }
        };
        nexus_prometheus::record_outbound(platform.as_ref(), "sent");

        let conversation = conversations::upsert_conversation(
            &self.db,
            tenant,
            platform,
            &request.external_id,
            &Participant::named(None),
        )
        .await?;
        let mut new = NewMessage::new(
            conversation.id,
            Direction::Outbound,
            request.message_type,
            request.content,
        );
        new.platform_message_id = Some(platform_message_id);
        new.metadata = request.metadata;
        new.is_processed = true;
        let stored = messages::append_message(&self.db, new).await?.into_message();
        debug!(tenant = %tenant, platform = %platform, message_id = %stored.id, "outbound message stored");
        Ok(stored)
    }

    /// [`BridgeManager::send_message`] with exponential backoff on
    /// retryable failures.
    pub async fn send_message_with_retry(
        &self,
        request: OutboundMessage,
    ) -> Result<Message, NexusError> {
        let policy = self.settings.retry;
        let mut attempt = 1;
        loop {
            match self.send_message(request.clone()).await {
                Ok(message) => return Ok(message),
                Err(e) if policy.should_retry(&e, attempt) => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        tenant = %request.tenant,
                        platform = %request.platform,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn mark_error(&self, bridge: &BridgeRecord, message: &str) {
        let _guard = self.lock_bridge(&bridge.tenant_id, bridge.platform).await;
        self.registry.evict(&bridge.tenant_id, bridge.platform).await;
        let current = match self.require_bridge(&bridge.tenant_id, bridge.platform).await {
            Ok(current) => current,
            Err(e) => {
                warn!(error = %e, "bridge lookup failed while recording auth error");
                return;
            }
        };
        if let Err(e) = self.transition(&current, BridgeStatus::Error, Some(message)).await {
            warn!(error = %e, "failed to record bridge auth error");
        }
    }
}

#[async_trait]
impl JobHandler for BridgeManager {
    async fn handle(&self, job: Job) {
        match job {
            Job::ProcessWebhook { event_id } => {
                let _ = self.process_webhook_event(event_id).await;
                self.in_flight.remove(&event_id);
            }
            Job::Assist(job) => {
                let message_id = job.message_id.clone();
                if let Err(e) = self.run_assist(job).await {
                    warn!(message_id = %message_id, error = %e, "AI job failed");
                }
                self.assisting.remove(&message_id);
            }
        }
    }
}
