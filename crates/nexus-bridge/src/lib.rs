// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing engine for the Nexus bridge.
//!
//! Ties the credential vault, storage, platform adapters, the workspace sink
//! and the AI orchestrator together:
//!
//! - [`AdapterRegistry`] caches one live adapter per `(tenant, platform)`.
//! - [`BridgeManager`] drives each bridge's lifecycle and routes inbound and
//!   outbound traffic.
//! - [`dispatch`] runs inbound processing on a bounded worker pool.
//! - [`RetryPolicy`] shapes backoff for retried sends.

pub mod dispatch;
pub mod manager;
pub mod registry;
pub mod retry;

pub use dispatch::{AssistJob, Job, JobHandler, JobQueue, JobReceiver};
pub use manager::{
    BridgeDeps, BridgeManager, BridgeSettings, BridgeStatusReport, ConnectionReport,
    OutboundMessage, SetupInstructions,
};
pub use registry::{AdapterRegistry, BridgeKey};
pub use retry::RetryPolicy;
