// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the routing engine and its collaborators.
//!
//! Platform adapters extend the [`PluginAdapter`] base trait. Every async
//! trait uses `#[async_trait]` so implementations can sit behind `Arc<dyn _>`.

pub mod adapter;
pub mod factory;
pub mod platform;
pub mod scorer;
pub mod tenant;
pub mod workspace;

pub use adapter::PluginAdapter;
pub use factory::AdapterFactory;
pub use platform::PlatformAdapter;
pub use scorer::{HistoryTurn, ResponseScorer, ScoreRequest, ScoredResponse};
pub use tenant::TenantDirectory;
pub use workspace::WorkspaceSink;
