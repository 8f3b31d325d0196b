// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory workspace sink that records every room and forwarded line.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use nexus_core::{NexusError, Platform, RoomHandle, TenantId, WorkspaceEventId, WorkspaceSink};
use tokio::sync::Mutex;

/// A line forwarded with [`WorkspaceSink::send_to_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomPost {
    pub room: RoomHandle,
    pub text: String,
}

/// A recorded [`WorkspaceSink::initialize_tenant_bridge`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeInit {
    pub tenant: TenantId,
    pub platform: Platform,
    pub public_ids: BTreeMap<String, String>,
}

pub struct MockWorkspace {
    posts: Mutex<Vec<RoomPost>>,
    inits: Mutex<Vec<BridgeInit>>,
    rooms: Mutex<HashMap<(TenantId, Platform, String), RoomHandle>>,
    failing_sends: AtomicUsize,
    next_event: AtomicUsize,
}

impl MockWorkspace {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            inits: Mutex::new(Vec::new()),
            rooms: Mutex::new(HashMap::new()),
            failing_sends: AtomicUsize::new(0),
            next_event: AtomicUsize::new(1),
        }
    }

    /// Makes the next `count` room sends fail with a transient error.
    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    pub async fn posts(&self) -> Vec<RoomPost> {
        self.posts.lock().await.clone()
    }

    pub async fn post_texts(&self) -> Vec<String> {
        self.posts.lock().await.iter().map(|p| p.text.clone()).collect()
    }

    pub async fn bridge_inits(&self) -> Vec<BridgeInit> {
        self.inits.lock().await.clone()
    }
}

impl Default for MockWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkspaceSink for MockWorkspace {
    async fn initialize_tenant_bridge(
        &self,
        tenant: &TenantId,
        platform: Platform,
        public_ids: &BTreeMap<String, String>,
    ) -> Result<RoomHandle, NexusError> {
        self.inits.lock().await.push(BridgeInit {
            tenant: tenant.clone(),
            platform,
            public_ids: public_ids.clone(),
        });
        Ok(RoomHandle(format!("!control-{tenant}-{platform}:mock")))
    }

    async fn send_to_room(
        &self,
        room: &RoomHandle,
        text: &str,
    ) -> Result<WorkspaceEventId, NexusError> {
        let failing = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(NexusError::transient("mock workspace unavailable"));
        }
        self.posts.lock().await.push(RoomPost {
            room: room.clone(),
            text: text.to_string(),
        });
        let n = self.next_event.fetch_add(1, Ordering::SeqCst);
        Ok(WorkspaceEventId(format!("$event-{n}")))
    }

    async fn get_or_create_room(
        &self,
        tenant: &TenantId,
        platform: Platform,
        external_id: &str,
    ) -> Result<RoomHandle, NexusError> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms
            .entry((tenant.clone(), platform, external_id.to_string()))
            .or_insert_with(|| RoomHandle(format!("!{tenant}-{platform}-{external_id}:mock")));
        Ok(room.clone())
    }
}
