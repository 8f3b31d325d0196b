// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./nexus.toml` > `~/.config/nexus/nexus.toml` > `/etc/nexus/nexus.toml`
//! with environment variable overrides via `NEXUS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::NexusConfig;

/// Config sections that may be addressed through `NEXUS_<SECTION>_<KEY>`.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "storage",
    "vault",
    "gateway",
    "bridge",
    "platforms",
    "assistant",
    "anthropic",
    "workspace",
    "metrics",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/nexus/nexus.toml` (system-wide)
/// 3. `~/.config/nexus/nexus.toml` (user XDG config)
/// 4. `./nexus.toml` (local directory)
/// 5. `NEXUS_*` environment variables
pub fn load_config() -> Result<NexusConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env vars).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<NexusConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NexusConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<NexusConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NexusConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(NexusConfig::default()))
        .merge(Toml::file("/etc/nexus/nexus.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("nexus/nexus.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("nexus.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `NEXUS_VAULT_KDF_MEMORY_COST` must map to
/// `vault.kdf_memory_cost`, not `vault.kdf.memory.cost`.
fn env_provider() -> Env {
    Env::prefixed("NEXUS_").map(|key| map_env_key(key.as_str()).into())
}

/// Rewrites the first `<section>_` prefix of an env key to `<section>.`.
///
/// Figment hands the key over in its original case, so it is lowercased first.
fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section)
            && let Some(field) = rest.strip_prefix('_')
        {
            return format!("{section}.{field}");
        }
    }
    key
}
