// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nexus serve` command implementation.
//!
//! Opens storage and the credential vault, wires the routing engine to the
//! compiled-in platform adapters, then runs the gateway, the dispatcher
//! workers and the replay sweep until a shutdown signal arrives.

use std::sync::Arc;

use nexus_anthropic::AnthropicScorer;
use nexus_assistant::{AssistantSettings, Orchestrator};
use nexus_bridge::{BridgeDeps, BridgeManager, BridgeSettings};
use nexus_config::model::{NexusConfig, WorkspaceConfig};
use nexus_core::{NexusError, ResponseScorer, WorkspaceSink};
use nexus_gateway::{AuthConfig, GatewayState, HealthState, ServerConfig};
use nexus_prometheus::PrometheusAdapter;
use nexus_storage::Database;
use nexus_vault::CredentialVault;
use tracing::{error, info, warn};

use crate::factory::BuiltinAdapterFactory;
use crate::shutdown;
use crate::tenants::ConfigTenantDirectory;
use crate::workspace::{HttpWorkspace, LogWorkspace};

/// Runs the `nexus serve` command.
pub async fn run_serve(config: NexusConfig) -> Result<(), NexusError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting nexus serve");

    let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
    info!(path = %config.storage.database_path, "database opened");

    let vault = Arc::new(CredentialVault::from_config(&config.vault)?);
    if !vault.is_available() {
        warn!("running with a locked vault; bridges cannot be configured or used for sending");
    }

    let prometheus = if config.metrics.enabled {
        match PrometheusAdapter::new() {
            Ok(adapter) => Some(adapter),
            Err(e) => {
                warn!(error = %e, "metrics disabled");
                None
            }
        }
    } else {
        None
    };
    let prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>> =
        prometheus.map(|adapter| {
            let handle = adapter.handle().clone();
            Arc::new(move || handle.render()) as Arc<dyn Fn() -> String + Send + Sync>
        });

    let scorer: Option<Arc<dyn ResponseScorer>> = match AnthropicScorer::new(&config.anthropic) {
        Ok(scorer) => {
            info!(model = %config.anthropic.model, "AI scorer configured");
            Some(Arc::new(scorer))
        }
        Err(e) => {
            warn!(error = %e, "AI scorer unavailable; only keyword escalation applies");
            None
        }
    };
    let orchestrator = Orchestrator::new(scorer, AssistantSettings::from(&config.assistant));

    let tenants = ConfigTenantDirectory::new(&config.tenants);
    info!(count = tenants.len(), "tenant directory loaded");

    let deps = BridgeDeps {
        db,
        vault,
        factory: Arc::new(BuiltinAdapterFactory::new(config.platforms.clone())),
        workspace: build_workspace(&config.workspace)?,
        tenants: Arc::new(tenants),
        orchestrator,
    };
    let settings = BridgeSettings::from(&config.bridge)
        .with_public_base_url(config.gateway.public_base_url.clone());
    let (manager, receiver) = BridgeManager::new(deps, settings);

    let cancel = shutdown::install_signal_handler();
    let workers = manager.spawn_workers(receiver, cancel.clone());
    let replay = manager.spawn_replay_loop(cancel.clone());
    info!(workers = workers.len(), "dispatcher started");

    if config.gateway.bearer_token.is_none() {
        warn!("gateway.bearer_token is not set; the management API rejects every request");
    }
    let state = GatewayState {
        manager: Arc::clone(&manager),
        auth: AuthConfig {
            bearer_token: config.gateway.bearer_token.clone(),
        },
        health: HealthState {
            start_time: std::time::Instant::now(),
            prometheus_render,
        },
    };
    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };

    let served = nexus_gateway::start_server(&server_config, state, cancel.clone()).await;
    // A bind failure returns before any signal; stop the background tasks too.
    cancel.cancel();

    for worker in workers {
        if let Err(e) = worker.await {
            error!(error = %e, "dispatcher worker panicked");
        }
    }
    if let Err(e) = replay.await {
        error!(error = %e, "replay loop panicked");
    }
    manager.shutdown().await;

    info!("nexus stopped");
    served
}

fn build_workspace(config: &WorkspaceConfig) -> Result<Arc<dyn WorkspaceSink>, NexusError> {
    match &config.base_url {
        Some(url) => {
            info!(url = %url, "forwarding to HTTP workspace");
            Ok(Arc::new(HttpWorkspace::new(url, config.token.clone())?))
        }
        None => {
            info!("no workspace.base_url; forwards are logged only");
            Ok(Arc::new(LogWorkspace::new()))
        }
    }
}

/// Initialize the tracing subscriber with an env filter.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nexus={log_level},warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
