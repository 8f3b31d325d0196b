// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation rows keyed by (tenant, external id, platform).

use nexus_core::{ConversationStatus, NexusError, Platform, TenantId};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::models::{self, Conversation, Participant};

const COLUMNS: &str = "id, tenant_id, external_id, platform, participant_name, participant_metadata,
     status, assigned_agent, metadata, created_at, updated_at";

fn from_row(row: &Row<'_>) -> Result<Conversation, rusqlite::Error> {
    let platform: String = row.get(3)?;
    let participant_metadata: String = row.get(5)?;
    let status: String = row.get(6)?;
    let metadata: String = row.get(8)?;
    Ok(Conversation {
        id: row.get(0)?,
        tenant_id: TenantId(row.get(1)?),
        external_id: row.get(2)?,
        platform: models::parse_enum(3, &platform)?,
        participant_name: row.get(4)?,
        participant_metadata: models::parse_json(5, &participant_metadata)?,
        status: models::parse_enum(6, &status)?,
        assigned_agent: row.get(7)?,
        metadata: models::parse_json(8, &metadata)?,
        created_at: models::parse_time(9, &row.get::<_, String>(9)?)?,
        updated_at: models::parse_time(10, &row.get::<_, String>(10)?)?,
    })
}

fn select_by_id(conn: &rusqlite::Connection, id: &str) -> Result<Option<Conversation>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Get-or-create a conversation.
///
/// Concurrent callers for the same triple converge on one row through the
/// unique constraint. A known display name overwrites the stored one and
/// participant metadata is merged.
pub async fn upsert_conversation(
    db: &Database,
    tenant: &TenantId,
    platform: Platform,
    external_id: &str,
    participant: &Participant,
) -> Result<Conversation, NexusError> {
    let id = uuid::Uuid::new_v4().to_string();
    let tenant = tenant.as_str().to_string();
    let platform = platform.to_string();
    let external_id = external_id.to_string();
    let name = participant.display_name.clone();
    let participant_metadata = match &participant.metadata {
        serde_json::Value::Null => "{}".to_string(),
        other => other.to_string(),
    };
    db.connection()
        .call(move |conn| -> Result<Conversation, rusqlite::Error> {
            let now = models::now();
            conn.execute(
                "INSERT INTO conversations
                     (id, tenant_id, external_id, platform, participant_name, participant_metadata, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, json(?6), ?7, ?7)
                 ON CONFLICT (tenant_id, external_id, platform) DO UPDATE SET
                     participant_name = COALESCE(excluded.participant_name, participant_name),
                     participant_metadata = json_patch(participant_metadata, excluded.participant_metadata),
                     updated_at = excluded.updated_at",
                params![id, tenant, external_id, platform, name, participant_metadata, now],
            )?;
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM conversations
                     WHERE tenant_id = ?1 AND external_id = ?2 AND platform = ?3"
                ),
                params![tenant, external_id, platform],
                from_row,
            )
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_conversation(db: &Database, id: &str) -> Result<Option<Conversation>, NexusError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Conversation>, rusqlite::Error> { select_by_id(conn, &id) })
        .await
        .map_err(crate::database::map_tr_err)
}

/// A tenant's conversations, most recently active first.
pub async fn list_conversations(
    db: &Database,
    tenant: &TenantId,
    platform: Option<Platform>,
    status: Option<ConversationStatus>,
) -> Result<Vec<Conversation>, NexusError> {
    let tenant = tenant.as_str().to_string();
    let platform = platform.map(|p| p.to_string());
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<Conversation>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM conversations
                 WHERE tenant_id = ?1
                   AND (?2 IS NULL OR platform = ?2)
                   AND (?3 IS NULL OR status = ?3)
                 ORDER BY updated_at DESC, id"
            ))?;
            let rows = stmt.query_map(params![tenant, platform, status], from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

async fn update_one(db: &Database, id: &str, sql: &'static str, value: Option<String>) -> Result<(), NexusError> {
    let conversation_id = id.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(sql, params![value, models::now(), conversation_id])
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if changed == 0 {
        return Err(NexusError::not_found("conversation", id));
    }
    Ok(())
}

pub async fn set_conversation_status(
    db: &Database,
    id: &str,
    status: ConversationStatus,
) -> Result<(), NexusError> {
    update_one(
        db,
        id,
        "UPDATE conversations SET status = ?1, updated_at = ?2 WHERE id = ?3",
        Some(status.to_string()),
    )
    .await
}

/// Assigns (or with `None`, unassigns) a human agent.
pub async fn assign_agent(db: &Database, id: &str, agent: Option<&str>) -> Result<(), NexusError> {
    update_one(
        db,
        id,
        "UPDATE conversations SET assigned_agent = ?1, updated_at = ?2 WHERE id = ?3",
        agent.map(String::from),
    )
    .await
}

/// Merges `patch` into the conversation metadata (RFC 7396 semantics).
pub async fn merge_conversation_metadata(
    db: &Database,
    id: &str,
    patch: &serde_json::Value,
) -> Result<(), NexusError> {
    update_one(
        db,
        id,
        "UPDATE conversations SET metadata = json_patch(metadata, ?1), updated_at = ?2 WHERE id = ?3",
        Some(patch.to_string()),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn concurrent_upserts_yield_one_row() {
        let (db, _dir) = setup_db().await;
        let tenant = TenantId::from("acme");

        let mut handles = Vec::new();
        for i in 0..16 {
            let db = db.clone();
            let tenant = tenant.clone();
            handles.push(tokio::spawn(async move {
                let participant = Participant::named(Some(format!("Caller {i}")));
                upsert_conversation(&db, &tenant, Platform::WhatsApp, "+15551234567", &participant)
                    .await
                    .unwrap()
            }));
        }

        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let count = db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM conversations", [], |r| r.get(0))
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn same_external_id_on_other_platform_or_tenant_is_distinct() {
        let (db, _dir) = setup_db().await;
        let p = Participant::default();
        let a = upsert_conversation(&db, &TenantId::from("acme"), Platform::Signal, "+1555", &p)
            .await
            .unwrap();
        let b = upsert_conversation(&db, &TenantId::from("acme"), Platform::WhatsApp, "+1555", &p)
            .await
            .unwrap();
        let c = upsert_conversation(&db, &TenantId::from("globex"), Platform::Signal, "+1555", &p)
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn later_contact_merges_participant_details() {
        let (db, _dir) = setup_db().await;
        let tenant = TenantId::from("acme");
        let first = upsert_conversation(
            &db,
            &tenant,
            Platform::Telegram,
            "4242",
            &Participant {
                display_name: Some("Ada".into()),
                metadata: json!({"lang": "en"}),
            },
        )
        .await
        .unwrap();

        let second = upsert_conversation(
            &db,
            &tenant,
            Platform::Telegram,
            "4242",
            &Participant {
                display_name: None,
                metadata: json!({"username": "ada_l"}),
            },
        )
        .await
        .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.participant_name.as_deref(), Some("Ada"));
        assert_eq!(second.participant_metadata, json!({"lang": "en", "username": "ada_l"}));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn status_agent_and_metadata_updates() {
        let (db, _dir) = setup_db().await;
        let tenant = TenantId::from("acme");
        let conv = upsert_conversation(&db, &tenant, Platform::Facebook, "psid-1", &Participant::default())
            .await
            .unwrap();

        set_conversation_status(&db, &conv.id, ConversationStatus::Escalated).await.unwrap();
        assign_agent(&db, &conv.id, Some("agent-7")).await.unwrap();
        merge_conversation_metadata(&db, &conv.id, &json!({"escalation_reason": "keyword: refund"}))
            .await
            .unwrap();

        let stored = get_conversation(&db, &conv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConversationStatus::Escalated);
        assert_eq!(stored.assigned_agent.as_deref(), Some("agent-7"));
        assert_eq!(stored.metadata["escalation_reason"], "keyword: refund");

        let escalated = list_conversations(&db, &tenant, None, Some(ConversationStatus::Escalated))
            .await
            .unwrap();
        assert_eq!(escalated.len(), 1);
        let on_signal = list_conversations(&db, &tenant, Some(Platform::Signal), None)
            .await
            .unwrap();
        assert!(on_signal.is_empty());

        let err = set_conversation_status(&db, "missing", ConversationStatus::Archived)
            .await
            .unwrap_err();
        assert!(matches!(err, NexusError::NotFound { .. }));
        db.close().await.unwrap();
    }
}
