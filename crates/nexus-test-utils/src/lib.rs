// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Nexus integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic,
//! CI-runnable routing tests without any platform or workspace service.
//!
//! # Components
//!
//! - [`MockAdapterFactory`] - Scriptable platform adapters with a JSON payload format
//! - [`MockWorkspace`] - In-memory workspace sink capturing every forwarded line
//! - [`MockScorer`] - AI scorer with a queue of pre-configured replies
//! - [`TestHarness`] - A running routing engine wired to the mocks

pub mod harness;
pub mod mock_platform;
pub mod mock_scorer;
pub mod mock_workspace;

pub use harness::{TestHarness, TestHarnessBuilder, test_vault_config};
pub use mock_platform::{
    MockAdapterFactory, MockInbound, MockPlatformState, SendFailure, inbound_payload,
    receipt_payload, valid_credentials,
};
pub use mock_scorer::{MockScorer, StaticTenants};
pub use mock_workspace::MockWorkspace;
