// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Nexus bridge engine.
//!
//! This crate provides the error taxonomy, the canonical inbound event model,
//! tenant and platform types, and the trait seams every other crate plugs
//! into: platform adapters, the adapter factory, the workspace sink, the AI
//! scorer and the tenant directory.

pub mod credentials;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use credentials::{Credentials, mask_secret};
pub use error::{ErrorKind, NexusError};
pub use types::{
    AiAnnotation, Attachment, BridgeStatus, ConnectionTest, ConversationStatus, Direction,
    InboundEvent, MessageType, ParsedWebhook, Platform, PlatformMessageId, RoomHandle, TenantId,
    TenantProfile, WorkspaceEventId,
};

pub use traits::{
    AdapterFactory, HistoryTurn, PlatformAdapter, PluginAdapter, ResponseScorer, ScoreRequest,
    ScoredResponse, TenantDirectory, WorkspaceSink,
};
