// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw webhook event log.
//!
//! Rows are written before any processing, so an event that never reaches
//! `processed = 1` can be replayed after a crash.

use nexus_core::{NexusError, Platform, TenantId};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::models::{self, WebhookEventRecord};

const COLUMNS: &str = "id, bridge_id, tenant_id, platform, event_type, payload, processed,
     retry_count, error, created_at, processed_at";

fn from_row(row: &Row<'_>) -> Result<WebhookEventRecord, rusqlite::Error> {
    let platform: String = row.get(3)?;
    let payload: String = row.get(5)?;
    Ok(WebhookEventRecord {
        id: row.get(0)?,
        bridge_id: row.get(1)?,
        tenant_id: TenantId(row.get(2)?),
        platform: models::parse_enum(3, &platform)?,
        event_type: row.get(4)?,
        payload: models::parse_json(5, &payload)?,
        processed: row.get(6)?,
        retry_count: row.get(7)?,
        error: row.get(8)?,
        created_at: models::parse_time(9, &row.get::<_, String>(9)?)?,
        processed_at: models::parse_opt_time(10, row.get(10)?)?,
    })
}

/// Persists a raw payload and returns its row id.
pub async fn insert_webhook_event(
    db: &Database,
    bridge_id: &str,
    tenant: &TenantId,
    platform: Platform,
    payload: &serde_json::Value,
) -> Result<i64, NexusError> {
    let bridge_id = bridge_id.to_string();
    let tenant = tenant.as_str().to_string();
    let platform = platform.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            conn.execute(
                "INSERT INTO webhook_events (bridge_id, tenant_id, platform, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![bridge_id, tenant, platform, payload, models::now()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_webhook_event(db: &Database, id: i64) -> Result<Option<WebhookEventRecord>, NexusError> {
    db.connection()
        .call(move |conn| -> Result<Option<WebhookEventRecord>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM webhook_events WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Records the label derived during normalization (`message`, `status`, `unknown`).
pub async fn set_event_type(db: &Database, id: i64, event_type: &str) -> Result<(), NexusError> {
    let event_type = event_type.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE webhook_events SET event_type = ?1 WHERE id = ?2",
                params![event_type, id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(())
}

pub async fn mark_event_processed(db: &Database, id: i64) -> Result<(), NexusError> {
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE webhook_events SET processed = 1, error = NULL, processed_at = ?1 WHERE id = ?2",
                params![models::now(), id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(())
}

/// Records a processing failure.
///
/// Retryable failures bump the retry counter. Non-retryable ones pin it at
/// `max_retries` so the replay sweep leaves the event alone.
pub async fn mark_event_failed(
    db: &Database,
    id: i64,
    error: &str,
    retryable: bool,
    max_retries: u32,
) -> Result<(), NexusError> {
    let error = error.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            if retryable {
                conn.execute(
                    "UPDATE webhook_events SET retry_count = retry_count + 1, error = ?1 WHERE id = ?2",
                    params![error, id],
                )
            } else {
                conn.execute(
                    "UPDATE webhook_events SET retry_count = MAX(retry_count, ?1), error = ?2 WHERE id = ?3",
                    params![max_retries, error, id],
                )
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    Ok(())
}

/// Unprocessed events still under the retry ceiling, oldest first.
pub async fn list_pending_events(
    db: &Database,
    max_retries: u32,
    limit: u32,
) -> Result<Vec<WebhookEventRecord>, NexusError> {
    db.connection()
        .call(move |conn| -> Result<Vec<WebhookEventRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM webhook_events
                 WHERE processed = 0 AND retry_count < ?1
                 ORDER BY id ASC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![max_retries, limit], from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The most recent events for a bridge, newest first.
pub async fn recent_events(
    db: &Database,
    bridge_id: &str,
    limit: u32,
) -> Result<Vec<WebhookEventRecord>, NexusError> {
    let bridge_id = bridge_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<WebhookEventRecord>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM webhook_events WHERE bridge_id = ?1 ORDER BY id DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![bridge_id, limit], from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
