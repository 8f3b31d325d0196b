// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for operations on storage entities.

pub mod bridges;
pub mod conversations;
pub mod messages;
pub mod webhook_events;
