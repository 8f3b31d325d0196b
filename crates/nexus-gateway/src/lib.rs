// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface of the Nexus bridge.
//!
//! Platform-facing webhook endpoints hand raw payloads to the routing
//! engine and always acknowledge. The bearer-authenticated management API
//! drives bridge setup, outbound sends and conversation history. Both are
//! thin layers over [`nexus_bridge::BridgeManager`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod webhooks;

pub use auth::AuthConfig;
pub use error::{ApiError, ErrorResponse};
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
