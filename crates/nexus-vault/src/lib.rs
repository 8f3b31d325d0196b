// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM credential vault for the Nexus bridge engine.
//!
//! Seals each bridge's platform credentials into an opaque, versioned blob
//! under a key derived (Argon2id) from one process-wide secret.

pub mod crypto;
pub mod kdf;
pub mod vault;

pub use nexus_core::mask_secret;
pub use vault::{CredentialVault, ENCRYPTION_VERSION, EncryptedBlob};
