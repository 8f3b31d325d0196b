// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message history.
//!
//! Messages are totally ordered within a conversation by
//! `(timestamp_ms, seq)`; `seq` is the autoincrement row id and therefore
//! follows insertion order.

use chrono::Utc;
use nexus_core::{AiAnnotation, Direction, NexusError, PlatformMessageId};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;
use crate::models::{self, AppendOutcome, Message, MessageCursor, MessageOrder, NewMessage};

const COLUMNS: &str = "seq, id, conversation_id, direction, message_type, content, sender, attachments,
     metadata, platform_message_id, webhook_event_id, timestamp_ms, is_processed, ai_annotation, created_at";

fn from_row(row: &Row<'_>) -> Result<Message, rusqlite::Error> {
    let direction: String = row.get(3)?;
    let message_type: String = row.get(4)?;
    let sender: String = row.get(6)?;
    let attachments: String = row.get(7)?;
    let metadata: String = row.get(8)?;
    let platform_message_id: Option<String> = row.get(9)?;
    let annotation: Option<String> = row.get(13)?;
    Ok(Message {
        seq: row.get(0)?,
        id: row.get(1)?,
        conversation_id: row.get(2)?,
        direction: models::parse_enum(3, &direction)?,
        message_type: models::parse_enum(4, &message_type)?,
        content: row.get(5)?,
        sender: models::parse_json(6, &sender)?,
        attachments: models::parse_json(7, &attachments)?,
        metadata: models::parse_json(8, &metadata)?,
        platform_message_id: platform_message_id.map(PlatformMessageId),
        webhook_event_id: row.get(10)?,
        timestamp: models::parse_millis(11, row.get(11)?)?,
        is_processed: row.get(12)?,
        ai_annotation: annotation
            .map(|a| models::parse_json(13, &a))
            .transpose()?,
        created_at: models::parse_time(14, &row.get::<_, String>(14)?)?,
    })
}

fn select_by_id(conn: &rusqlite::Connection, id: &str) -> Result<Option<Message>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM messages WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

/// Appends a message to its conversation.
///
/// An inbound message whose platform id is already stored for the
/// conversation is not inserted again; the existing row comes back as
/// [`AppendOutcome::Duplicate`].
pub async fn append_message(db: &Database, message: NewMessage) -> Result<AppendOutcome, NexusError> {
    let id = uuid::Uuid::new_v4().to_string();
    db.connection()
        .call(move |conn| -> Result<AppendOutcome, rusqlite::Error> {
            let tx = conn.transaction()?;

            let platform_id = message.platform_message_id.as_ref().map(|p| p.0.clone());
            if message.direction == Direction::Inbound
                && let Some(pid) = &platform_id
            {
                let existing = tx
                    .query_row(
                        &format!(
                            "SELECT {COLUMNS} FROM messages
                             WHERE conversation_id = ?1 AND platform_message_id = ?2 AND direction = 'inbound'"
                        ),
                        params![message.conversation_id, pid],
                        from_row,
                    )
                    .optional()?;
                if let Some(existing) = existing {
                    return Ok(AppendOutcome::Duplicate(existing));
                }
            }

            let arrival = Utc::now();
            let timestamp = models::resolve_timestamp(message.platform_timestamp, arrival);
            let created_at = models::fmt_time(&arrival);
            tx.execute(
                "INSERT INTO messages
                     (id, conversation_id, direction, message_type, content, sender, attachments, metadata,
                      platform_message_id, webhook_event_id, timestamp_ms, is_processed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    id,
                    message.conversation_id,
                    message.direction.to_string(),
                    message.message_type.to_string(),
                    message.content,
                    models::to_json(&message.sender)?,
                    models::to_json(&message.attachments)?,
                    models::to_json(&message.metadata)?,
                    platform_id,
                    message.webhook_event_id,
                    timestamp.timestamp_millis(),
                    message.is_processed,
                    created_at,
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![created_at, message.conversation_id],
            )?;
            let stored = select_by_id(&tx, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(AppendOutcome::Inserted(stored))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_message(db: &Database, id: &str) -> Result<Option<Message>, NexusError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Message>, rusqlite::Error> { select_by_id(conn, &id) })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The newest `limit` messages strictly before `before` (or overall), in
/// the requested order.
pub async fn list_messages(
    db: &Database,
    conversation_id: &str,
    order: MessageOrder,
    limit: u32,
    before: Option<MessageCursor>,
) -> Result<Vec<Message>, NexusError> {
    let conversation_id = conversation_id.to_string();
    let (before_ts, before_seq) = match before {
        Some(c) => (Some(c.timestamp_ms), Some(c.seq)),
        None => (None, None),
    };
    let mut page = db
        .connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE conversation_id = ?1
                   AND (?2 IS NULL OR timestamp_ms < ?2 OR (timestamp_ms = ?2 AND seq < ?3))
                 ORDER BY timestamp_ms DESC, seq DESC
                 LIMIT ?4"
            ))?;
            let rows = stmt.query_map(params![conversation_id, before_ts, before_seq, limit], from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if order == MessageOrder::OldestFirst {
        page.reverse();
    }
    Ok(page)
}

/// Walks a conversation's history backwards in pages.
///
/// Each page is returned in the pager's [`MessageOrder`]. Nothing is read
/// until [`MessagePager::next_page`] is called, and a pager can be restarted
/// from any [`MessageCursor`] it previously reported.
pub struct MessagePager {
    db: Database,
    conversation_id: String,
    order: MessageOrder,
    page_size: u32,
    cursor: Option<MessageCursor>,
    done: bool,
}

impl MessagePager {
    pub fn new(db: Database, conversation_id: impl Into<String>, order: MessageOrder, page_size: u32) -> Self {
        Self {
            db,
            conversation_id: conversation_id.into(),
            order,
            page_size: page_size.max(1),
            cursor: None,
            done: false,
        }
    }

    /// Resumes strictly before `cursor`.
    pub fn starting_before(mut self, cursor: MessageCursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Where the next page will start. Save it to restart later.
    pub fn cursor(&self) -> Option<MessageCursor> {
        self.cursor
    }

    /// The next page, or `None` once the history is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Message>>, NexusError> {
        if self.done {
            return Ok(None);
        }
        let page = list_messages(
            &self.db,
            &self.conversation_id,
            self.order,
            self.page_size,
            self.cursor,
        )
        .await?;

        if (page.len() as u32) < self.page_size {
            self.done = true;
        }
        let oldest = match self.order {
            MessageOrder::OldestFirst => page.first(),
            MessageOrder::NewestFirst => page.last(),
        };
        match oldest {
            Some(m) => self.cursor = Some(m.cursor()),
            None => return Ok(None),
        }
        Ok(Some(page))
    }
}

pub async fn mark_message_processed(db: &Database, id: &str) -> Result<(), NexusError> {
    let message_id = id.to_string();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute("UPDATE messages SET is_processed = 1 WHERE id = ?1", params![message_id])
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if changed == 0 {
        return Err(NexusError::not_found("message", id));
    }
    Ok(())
}

pub async fn set_message_annotation(
    db: &Database,
    id: &str,
    annotation: &AiAnnotation,
) -> Result<(), NexusError> {
    let message_id = id.to_string();
    let annotation = serde_json::to_string(annotation)
        .map_err(|e| NexusError::Internal(format!("annotation serialization: {e}")))?;
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE messages SET ai_annotation = ?1 WHERE id = ?2",
                params![annotation, message_id],
            )
        })
        .await
        .map_err(crate::database::map_tr_err)?;
    if changed == 0 {
        return Err(NexusError::not_found("message", id));
    }
    Ok(())
}

/// Forwarded inbound messages with no AI annotation, oldest first.
///
/// These are messages whose scoring job was never run to completion.
pub async fn list_unscored_inbound(db: &Database, limit: u32) -> Result<Vec<Message>, NexusError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE direction = 'inbound' AND is_processed = 1 AND ai_annotation IS NULL
                 ORDER BY seq ASC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], from_row)?;
            rows.collect()
        })
        .await
        .map_err(crate::database::map_tr_err)
}
