// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as valid bind hosts, threshold ranges, and unique tenant ids.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::NexusConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &NexusConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.gateway.host.trim();
    if host.is_empty() {
        fail("gateway.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.vault.kdf_memory_cost < 32768 {
        fail(format!(
            "vault.kdf_memory_cost must be at least 32768 (32 MiB), got {}",
            config.vault.kdf_memory_cost
        ));
    }
    if config.vault.kdf_iterations < 2 {
        fail(format!(
            "vault.kdf_iterations must be at least 2, got {}",
            config.vault.kdf_iterations
        ));
    }
    if config.vault.kdf_parallelism < 1 {
        fail(format!(
            "vault.kdf_parallelism must be at least 1, got {}",
            config.vault.kdf_parallelism
        ));
    }
    if config.vault.key_salt.is_empty() {
        fail("vault.key_salt must not be empty".to_string());
    }
    if let Some(secret) = &config.vault.secret
        && secret.len() < 16
    {
        fail("vault.secret must be at least 16 characters".to_string());
    }

    if config.bridge.workers == 0 {
        fail("bridge.workers must be at least 1".to_string());
    }
    if config.bridge.queue_capacity == 0 {
        fail("bridge.queue_capacity must be at least 1".to_string());
    }
    if config.bridge.send_max_attempts == 0 {
        fail("bridge.send_max_attempts must be at least 1".to_string());
    }
    if config.bridge.test_timeout_secs == 0 {
        fail("bridge.test_timeout_secs must be at least 1".to_string());
    }

    if !(1..=20).contains(&config.assistant.history_limit) {
        fail(format!(
            "assistant.history_limit must be between 1 and 20, got {}",
            config.assistant.history_limit
        ));
    }
    if config.assistant.scorer_timeout_secs == 0 {
        fail("assistant.scorer_timeout_secs must be at least 1".to_string());
    }
    if !(0.0..=1.0).contains(&config.anthropic.temperature) {
        fail(format!(
            "anthropic.temperature must be between 0.0 and 1.0, got {}",
            config.anthropic.temperature
        ));
    }

    let mut seen_ids = HashSet::new();
    for (i, tenant) in config.tenants.iter().enumerate() {
        if tenant.id.trim().is_empty() {
            fail(format!("tenants[{i}].id must not be empty"));
        } else if tenant.id.contains('/') {
            fail(format!("tenants[{i}].id `{}` must not contain '/'", tenant.id));
        }
        if !seen_ids.insert(tenant.id.as_str()) {
            fail(format!(
                "duplicate tenant id `{}` in [[tenants]] array",
                tenant.id
            ));
        }
        if !(0.0..=1.0).contains(&tenant.confidence_threshold) {
            fail(format!(
                "tenants[{i}].confidence_threshold must be between 0.0 and 1.0, got {}",
                tenant.confidence_threshold
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TenantConfig;

    fn tenant(id: &str, threshold: f64) -> TenantConfig {
        TenantConfig {
            id: id.to_string(),
            name: "Acme".to_string(),
            industry: None,
            ai_enabled: true,
            auto_respond: false,
            confidence_threshold: threshold,
            escalation_keywords: vec![],
            system_prompt: None,
        }
    }

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = NexusConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = NexusConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn threshold_out_of_range_fails_validation() {
        let mut config = NexusConfig::default();
        config.tenants = vec![tenant("acme", 1.5)];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "confidence_threshold"));
    }

    #[test]
    fn duplicate_tenant_ids_fail_validation() {
        let mut config = NexusConfig::default();
        config.tenants = vec![tenant("acme", 0.8), tenant("acme", 0.9)];
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "duplicate tenant id"));
    }

    #[test]
    fn zero_workers_and_short_secret_are_both_reported() {
        let mut config = NexusConfig::default();
        config.bridge.workers = 0;
        config.vault.secret = Some("short".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(has_error(&errors, "bridge.workers"));
        assert!(has_error(&errors, "vault.secret"));
    }

    #[test]
    fn valid_custom_config_passes() {
        let mut config = NexusConfig::default();
        config.gateway.host = "0.0.0.0".to_string();
        config.storage.database_path = "/tmp/test.db".to_string();
        config.vault.secret = Some("a-long-enough-process-secret".into());
        config.tenants = vec![tenant("acme", 0.8), tenant("globex", 0.65)];
        assert!(validate_config(&config).is_ok());
    }
}
