// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id key derivation from the process-wide credential secret.
//!
//! Derives a 32-byte key using Argon2id (Algorithm::Argon2id, Version::V0x13)
//! with parameters from `VaultConfig`. The salt is a deployment constant so
//! every process sharing the secret derives the same key.

use nexus_core::NexusError;
use ring::digest::{SHA256, digest};
use zeroize::Zeroizing;

/// Derive a 32-byte key from `secret` using Argon2id.
///
/// The returned key is wrapped in [`Zeroizing`] for automatic memory zeroing
/// on drop.
pub fn derive_key(
    secret: &[u8],
    salt: &[u8; 16],
    memory_cost: u32,
    iterations: u32,
    parallelism: u32,
) -> Result<Zeroizing<[u8; 32]>, NexusError> {
    let params = argon2::Params::new(memory_cost, iterations, parallelism, Some(32))
        .map_err(|e| NexusError::Config(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(secret, salt, output.as_mut())
        .map_err(|e| NexusError::credential_unavailable(format!("Argon2id key derivation failed: {e}")))?;

    Ok(output)
}

/// Reduces the configured salt label to the 16 bytes Argon2id expects.
pub fn salt_from_label(label: &str) -> [u8; 16] {
    let hash = digest(&SHA256, label.as_bytes());
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&hash.as_ref()[..16]);
    salt
}
