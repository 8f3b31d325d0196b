// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live adapter cache keyed by `(tenant, platform)`.
//!
//! Each key owns a slot guarded by its own async mutex. First access builds
//! the adapter while holding that slot's lock, so concurrent callers for the
//! same bridge wait for one construction instead of racing to build several.
//! The map's shard guard is only held long enough to clone the slot handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use nexus_core::{AdapterFactory, NexusError, Platform, PlatformAdapter, PluginAdapter, TenantId};
use nexus_storage::Database;
use nexus_storage::queries::bridges;
use nexus_vault::{CredentialVault, EncryptedBlob};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub type BridgeKey = (TenantId, Platform);

type Slot = Arc<Mutex<Option<Arc<dyn PlatformAdapter>>>>;

pub struct AdapterRegistry {
    db: Database,
    vault: Arc<CredentialVault>,
    factory: Arc<dyn AdapterFactory>,
    slots: DashMap<BridgeKey, Slot>,
    cached: AtomicUsize,
}

impl AdapterRegistry {
    pub fn new(db: Database, vault: Arc<CredentialVault>, factory: Arc<dyn AdapterFactory>) -> Self {
        Self {
            db,
            vault,
            factory,
            slots: DashMap::new(),
            cached: AtomicUsize::new(0),
        }
    }

    fn slot(&self, tenant: &TenantId, platform: Platform) -> Slot {
        self.slots
            .entry((tenant.clone(), platform))
            .or_default()
            .value()
            .clone()
    }

    /// Returns the cached adapter, building it from stored credentials on
    /// first use.
    pub async fn get_or_create(
        &self,
        tenant: &TenantId,
        platform: Platform,
    ) -> Result<Arc<dyn PlatformAdapter>, NexusError> {
        let slot = self.slot(tenant, platform);
        let mut guard = slot.lock().await;
        if let Some(adapter) = guard.as_ref() {
            return Ok(Arc::clone(adapter));
        }

        let adapter = self.build(tenant, platform).await?;
        *guard = Some(Arc::clone(&adapter));
        let count = self.cached.fetch_add(1, Ordering::SeqCst) + 1;
        nexus_prometheus::set_cached_adapters(count);
        info!(tenant = %tenant, platform = %platform, "platform adapter cached");
        Ok(adapter)
    }

    async fn build(
        &self,
        tenant: &TenantId,
        platform: Platform,
    ) -> Result<Arc<dyn PlatformAdapter>, NexusError> {
        let bridge = bridges::get_bridge(&self.db, tenant, platform)
            .await?
            .ok_or_else(|| NexusError::not_found("bridge", format!("{tenant}/{platform}")))?;
        let blob = bridge.credentials.ok_or_else(|| {
            NexusError::Config(format!("bridge {tenant}/{platform} has no stored credentials"))
        })?;
        let credentials = self.vault.decrypt(&EncryptedBlob::from_bytes(blob))?;
        debug!(tenant = %tenant, platform = %platform, "constructing platform adapter");
        self.factory.build(tenant, platform, &credentials)
    }

    /// Drops the cached adapter so the next access re-reads credentials.
    ///
    /// Returns `true` when an adapter was cached.
    pub async fn evict(&self, tenant: &TenantId, platform: Platform) -> bool {
        let Some(slot) = self
            .slots
            .get(&(tenant.clone(), platform))
            .map(|entry| entry.value().clone())
        else {
            return false;
        };

        let evicted = slot.lock().await.take();
        let Some(adapter) = evicted else {
            return false;
        };

        let count = self.cached.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        nexus_prometheus::set_cached_adapters(count);
        let adapter_name = adapter.name().to_string();
        if let Err(e) = adapter.shutdown().await {
            warn!(tenant = %tenant, adapter = %adapter_name, error = %e, "adapter shutdown failed");
        }
        info!(tenant = %tenant, platform = %platform, adapter = %adapter_name, "platform adapter evicted");
        true
    }

    /// Evicts every cached adapter. Used on process shutdown.
    pub async fn shutdown_all(&self) {
        let keys: Vec<BridgeKey> = self.slots.iter().map(|e| e.key().clone()).collect();
        for (tenant, platform) in keys {
            self.evict(&tenant, platform).await;
        }
    }

    /// Number of adapters currently cached.
    pub fn len(&self) -> usize {
        self.cached.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an adapter is cached for the key. A slot mid-construction
    /// counts as cached.
    pub fn contains(&self, tenant: &TenantId, platform: Platform) -> bool {
        self.slots
            .get(&(tenant.clone(), platform))
            .map(|entry| match entry.value().try_lock() {
                Ok(guard) => guard.is_some(),
                Err(_) => true,
            })
            .unwrap_or(false)
    }
}
