// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge configuration rows.

use std::collections::BTreeMap;

use nexus_core::{BridgeStatus, NexusError, Platform, RoomHandle, TenantId};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::models::{self, BridgeRecord};

const COLUMNS: &str = "id, tenant_id, platform, status, credentials, encryption_version, public_ids,
     room_handle, webhook_path, last_sync_at, error_message, setup_completed_at, created_at, updated_at";

fn from_row(row: &Row<'_>) -> Result<BridgeRecord, rusqlite::Error> {
    let tenant: String = row.get(1)?;
    let platform: String = row.get(2)?;
    let status: String = row.get(3)?;
    let public_ids: String = row.get(6)?;
    let room: Option<String> = row.get(7)?;
    Ok(BridgeRecord {
        id: row.get(0)?,
        tenant_id: TenantId(tenant),
        platform: models::parse_enum(2, &platform)?,
        status: models::parse_enum(3, &status)?,
        credentials: row.get(4)?,
        encryption_version: row.get(5)?,
        public_ids: models::parse_json(6, &public_ids)?,
        room_handle: room.map(RoomHandle),
        webhook_path: row.get(8)?,
        last_sync_at: models::parse_opt_time(9, row.get(9)?)?,
        error_message: row.get(10)?,
        setup_completed_at: models::parse_opt_time(11, row.get(11)?)?,
        created_at: models::parse_time(12, &row.get::<_, String>(12)?)?,
        updated_at: models::parse_time(13, &row.get::<_, String>(13)?)?,
    })
}

fn select_one(
    conn: &rusqlite::Connection,
    tenant: &str,
    platform: &str,
) -> Result<Option<BridgeRecord>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM bridge_configurations WHERE tenant_id = ?1 AND platform = ?2"),
        params![tenant, platform],
        from_row,
    )
    .optional()
}

/// Returns the bridge for `(tenant, platform)`, creating a `pending` row if
/// none exists. The flag is `true` when the row was created by this call.
pub async fn get_or_create_bridge(
    db: &Database,
    tenant: &TenantId,
    platform: Platform,
) -> Result<(BridgeRecord, bool), NexusError> {
    let id = uuid::Uuid::new_v4().to_string();
    let path = models::webhook_path(platform, tenant);
    let tenant = tenant.as_str().to_string();
    let platform = platform.to_string();
    db.connection()
        .call(move |conn| -> Result<(BridgeRecord, bool), rusqlite::Error> {
            let now = models::now();
            let inserted = conn.execute(
                "INSERT INTO bridge_configurations (id, tenant_id, platform, status, webhook_path, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?5)
                 ON CONFLICT (tenant_id, platform) DO NOTHING",
                params![id, tenant, platform, path, now],
            )?;
            let record = select_one(conn, &tenant, &platform)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            Ok((record, inserted == 1))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_bridge(
    db: &Database,
    tenant: &TenantId,
    platform: Platform,
) -> Result<Option<BridgeRecord>, NexusError> {
    let tenant = tenant.as_str().to_string();
    let platform = platform.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<BridgeRecord>, rusqlite::Error> {
            select_one(conn, &tenant, &platform)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// All bridges of a tenant, ordered by platform name.
pub async fn list_bridges(db: &Database, tenant: &TenantId) -> Result<Vec<BridgeRecord>, NexusError> {
    let tenant = tenant.as_str().to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<BridgeRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM bridge_configurations WHERE tenant_id = ?1 ORDER BY platform"
            ))?;
            let rows = stmt.query_map(params![tenant], from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn require_updated(id: &str, changed: usize) -> Result<(), NexusError> {
    if changed == 0 {
        Err(NexusError::not_found("bridge", id))
    } else {
        Ok(())
    }
}

/// Sets the status. `error_message` replaces the stored message (pass `None`
/// to clear it).
pub async fn update_bridge_status(
    db: &Database,
    id: &str,
    status: BridgeStatus,
    error_message: Option<&str>,
) -> Result<(), NexusError> {
    let bridge_id = id.to_string();
    let status = status.to_string();
    let error_message = error_message.map(String::from);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE bridge_configurations SET status = ?1, error_message = ?2, updated_at = ?3 WHERE id = ?4",
                params![status, error_message, models::now(), bridge_id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    require_updated(id, changed)
}

/// Stores a sealed credential blob and the platform's public identifiers.
pub async fn store_credentials(
    db: &Database,
    id: &str,
    blob: Vec<u8>,
    encryption_version: &str,
    public_ids: &BTreeMap<String, String>,
) -> Result<(), NexusError> {
    let bridge_id = id.to_string();
    let version = encryption_version.to_string();
    let public_ids = serde_json::to_string(public_ids)
        .map_err(|e| NexusError::Internal(format!("public id serialization: {e}")))?;
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE bridge_configurations
                 SET credentials = ?1, encryption_version = ?2, public_ids = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![blob, version, public_ids, models::now(), bridge_id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    require_updated(id, changed)
}

/// Records the workspace room link and moves the bridge to `active`.
///
/// `setup_completed_at` keeps its first value across reactivations.
pub async fn mark_activated(db: &Database, id: &str, room: &RoomHandle) -> Result<(), NexusError> {
    let bridge_id = id.to_string();
    let room = room.0.clone();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let now = models::now();
            conn.execute(
                "UPDATE bridge_configurations
                 SET status = 'active', room_handle = ?1, error_message = NULL,
                     setup_completed_at = COALESCE(setup_completed_at, ?2),
                     last_sync_at = ?2, updated_at = ?2
                 WHERE id = ?3",
                params![room, now, bridge_id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    require_updated(id, changed)
}

/// Bumps `last_sync_at` after successful platform traffic.
pub async fn touch_last_sync(db: &Database, id: &str) -> Result<(), NexusError> {
    let bridge_id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE bridge_configurations SET last_sync_at = ?1 WHERE id = ?2",
                params![models::now(), bridge_id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(())
}
