// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant directory backed by `[[tenants]]` entries in the config file.

use std::collections::HashMap;

use async_trait::async_trait;
use nexus_config::model::TenantConfig;
use nexus_core::{NexusError, TenantDirectory, TenantId, TenantProfile};

pub struct ConfigTenantDirectory {
    tenants: HashMap<TenantId, TenantProfile>,
}

impl ConfigTenantDirectory {
    pub fn new(entries: &[TenantConfig]) -> Self {
        let tenants = entries
            .iter()
            .map(|entry| {
                let profile = TenantProfile {
                    industry: entry.industry.clone(),
                    ai_enabled: entry.ai_enabled,
                    auto_respond: entry.auto_respond,
                    confidence_threshold: entry.confidence_threshold,
                    escalation_keywords: entry.escalation_keywords.clone(),
                    system_prompt: entry.system_prompt.clone(),
                    ..TenantProfile::new(entry.id.as_str(), entry.name.as_str())
                };
                (profile.id.clone(), profile)
            })
            .collect();
        Self { tenants }
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }
}

#[async_trait]
impl TenantDirectory for ConfigTenantDirectory {
    async fn tenant(&self, id: &TenantId) -> Result<Option<TenantProfile>, NexusError> {
        Ok(self.tenants.get(id).cloned())
    }
}
