// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant credential sealing.
//!
//! A single process-wide key (derived from `vault.secret`) seals every
//! bridge's credential map. Blobs carry no tenant identity; they are only
//! reachable through the owning bridge row.
//!
//! Blob layout, version `v1`:
//!
//! ```text
//! b"v1" || nonce (12 bytes) || AES-256-GCM ciphertext + tag
//! ```
//!
//! The version tag is also the AEAD associated data.

use std::fmt;

use nexus_config::model::VaultConfig;
use nexus_core::{Credentials, NexusError, Platform, TenantId};
use ring::aead::NONCE_LEN;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto;
use crate::kdf;

/// Version tag written by [`CredentialVault::encrypt`].
pub const ENCRYPTION_VERSION: &str = "v1";

const TAG_LEN: usize = 2;

/// Opaque, versioned ciphertext of one credential map.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob(Vec<u8>);

impl EncryptedBlob {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// The leading version tag, if the blob is long enough to carry one.
    pub fn version(&self) -> Option<&str> {
        self.0
            .get(..TAG_LEN)
            .and_then(|tag| std::str::from_utf8(tag).ok())
    }
}

impl fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("version", &self.version())
            .field("len", &self.0.len())
            .finish()
    }
}

/// Seals and opens tenant credential maps.
///
/// Fails closed: without a secret every call returns
/// [`NexusError::CredentialUnavailable`].
pub struct CredentialVault {
    key: Option<Zeroizing<[u8; 32]>>,
}

impl fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialVault")
            .field("key", &if self.key.is_some() { "[REDACTED]" } else { "None" })
            .finish()
    }
}

impl CredentialVault {
    /// Derives the vault key from configuration.
    ///
    /// A missing secret yields a locked vault rather than an error so the
    /// service can still accept and record inbound webhooks.
    pub fn from_config(config: &VaultConfig) -> Result<Self, NexusError> {
        match &config.secret {
            Some(secret) => Self::from_secret(
                &SecretString::from(secret.clone()),
                &config.key_salt,
                config.kdf_memory_cost,
                config.kdf_iterations,
                config.kdf_parallelism,
            ),
            None => {
                warn!("vault.secret is not set; credential operations will fail");
                Ok(Self::locked())
            }
        }
    }

    pub fn from_secret(
        secret: &SecretString,
        salt_label: &str,
        memory_cost: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, NexusError> {
        let salt = kdf::salt_from_label(salt_label);
        let key = kdf::derive_key(
            secret.expose_secret().as_bytes(),
            &salt,
            memory_cost,
            iterations,
            parallelism,
        )?;
        debug!("credential vault key derived");
        Ok(Self { key: Some(key) })
    }

    /// A vault with no key. Every operation fails closed.
    pub fn locked() -> Self {
        Self { key: None }
    }

    pub fn is_available(&self) -> bool {
        self.key.is_some()
    }

    pub fn encryption_version(&self) -> &'static str {
        ENCRYPTION_VERSION
    }

    fn key(&self) -> Result<&[u8; 32], NexusError> {
        self.key
            .as_deref()
            .ok_or_else(|| NexusError::credential_unavailable("vault secret is not configured"))
    }

    /// Seals `credentials` for the given bridge. Synchronous and side-effect-free.
    pub fn encrypt(
        &self,
        tenant: &TenantId,
        platform: Platform,
        credentials: &Credentials,
    ) -> Result<EncryptedBlob, NexusError> {
        let key = self.key()?;
        let plaintext = Zeroizing::new(
            serde_json::to_vec(credentials)
                .map_err(|e| NexusError::Internal(format!("credential serialization: {e}")))?,
        );

        let tag = ENCRYPTION_VERSION.as_bytes();
        let (ciphertext, nonce) = crypto::seal(key, tag, &plaintext)?;

        let mut bytes = Vec::with_capacity(TAG_LEN + NONCE_LEN + ciphertext.len());
        bytes.extend_from_slice(tag);
        bytes.extend_from_slice(&nonce);
        bytes.extend_from_slice(&ciphertext);

        debug!(tenant = %tenant, platform = %platform, fields = credentials.len(), "credentials sealed");
        Ok(EncryptedBlob(bytes))
    }

    /// Opens a blob produced by [`CredentialVault::encrypt`].
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<Credentials, NexusError> {
        let key = self.key()?;

        match blob.version() {
            Some(ENCRYPTION_VERSION) => {}
            other => {
                return Err(NexusError::credential_unavailable(format!(
                    "unsupported credential encryption version {other:?}"
                )));
            }
        }

        let body = &blob.as_bytes()[TAG_LEN..];
        if body.len() < NONCE_LEN {
            return Err(NexusError::credential_unavailable(
                "credential blob is truncated",
            ));
        }
        let (nonce_bytes, ciphertext) = body.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);

        let plaintext = Zeroizing::new(crypto::open(
            key,
            &nonce,
            ENCRYPTION_VERSION.as_bytes(),
            ciphertext,
        )?);
        serde_json::from_slice(&plaintext).map_err(|_| {
            NexusError::credential_unavailable("decrypted credentials are not a valid map")
        })
    }
}
