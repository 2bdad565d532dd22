use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::Database;
use crate::models::{AttachmentRow, MessageRow, ReactionCountRow, SummaryRow, UserRow};

impl Database {
    // -- Users --

    /// Seed path for the identity collaborator and test fixtures; the
    /// sync subsystem itself never writes users.
    pub fn insert_user(&self, id: &str, display_name: &str, avatar: Option<&str>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, avatar) VALUES (?1, ?2, ?3)",
                params![id, display_name, avatar],
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, display_name, avatar FROM users WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            display_name: row.get(1)?,
                            avatar: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Presence --

    /// Atomic upsert keyed by (user_id, session_id). Two racing heartbeats
    /// from the same session collapse onto one row instead of duplicating it.
    pub fn record_heartbeat(&self, user_id: &str, session_id: &str, now_secs: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO presence_sessions (user_id, session_id, last_activity)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, session_id)
                 DO UPDATE SET last_activity = excluded.last_activity",
                params![user_id, session_id, now_secs],
            )?;
            Ok(())
        })
    }

    /// Most recent heartbeat per user, for the requested ids. Users with no
    /// presence row at all are simply absent from the result.
    pub fn latest_activity(&self, user_ids: &[String]) -> Result<HashMap<String, i64>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=user_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT user_id, MAX(last_activity) FROM presence_sessions
                 WHERE user_id IN ({}) GROUP BY user_id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let bindings: Vec<&dyn rusqlite::types::ToSql> = user_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(bindings.as_slice(), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().collect())
        })
    }

    // -- Messages --

    /// Insert a message, assigning both id and sent_at store-side.
    ///
    /// sent_at is max(now_us, previous max + 1), computed inside the insert
    /// transaction, so it is strictly increasing even for two sends landing
    /// in the same microsecond. That makes the strict-`>` cursor contract
    /// exact. Returns (id, sent_at).
    pub fn insert_message(
        &self,
        sender_id: &str,
        receiver_id: &str,
        text: Option<&str>,
        attachment_id: Option<&str>,
        initial_reaction: Option<&str>,
    ) -> Result<(i64, i64)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let prev_max: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sent_at), 0) FROM messages",
                [],
                |row| row.get(0),
            )?;
            let now_us = chrono::Utc::now().timestamp_micros();
            let sent_at = now_us.max(prev_max + 1);

            tx.execute(
                "INSERT INTO messages (sender_id, receiver_id, text, attachment_id, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![sender_id, receiver_id, text, attachment_id, sent_at],
            )?;
            let id = tx.last_insert_rowid();

            if let Some(label) = initial_reaction {
                tx.execute(
                    "INSERT INTO reactions (message_id, label, count) VALUES (?1, ?2, 1)",
                    params![id, label],
                )?;
            }

            tx.commit()?;
            Ok((id, sent_at))
        })
    }

    /// Both directions of a two-party conversation, ascending by sent_at.
    /// `since_us` is strict: the boundary message is never re-delivered.
    pub fn fetch_between(
        &self,
        user_a: &str,
        user_b: &str,
        since_us: Option<i64>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, text, attachment_id, sent_at
                 FROM messages
                 WHERE ((sender_id = ?1 AND receiver_id = ?2)
                     OR (sender_id = ?2 AND receiver_id = ?1))
                   AND (?3 IS NULL OR sent_at > ?3)
                 ORDER BY sent_at ASC",
            )?;

            let rows = stmt
                .query_map(params![user_a, user_b, since_us], |row| {
                    Ok(MessageRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        receiver_id: row.get(2)?,
                        text: row.get(3)?,
                        attachment_id: row.get(4)?,
                        sent_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// One entry per counterpart — every other user appears, zero-message
    /// counterparts included with an empty preview. Most-recent-first, then
    /// the message-less tail alphabetically.
    pub fn conversation_summaries(
        &self,
        user_id: &str,
        day_floor_us: i64,
    ) -> Result<Vec<SummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.display_name, u.avatar,
                        m.text, m.attachment_id, m.sent_at,
                        (SELECT COUNT(*) FROM messages c
                          WHERE ((c.sender_id = u.id AND c.receiver_id = ?1)
                              OR (c.sender_id = ?1 AND c.receiver_id = u.id))
                            AND c.sent_at > ?2)
                 FROM users u
                 LEFT JOIN messages m ON m.id = (
                     SELECT id FROM messages
                      WHERE (sender_id = u.id AND receiver_id = ?1)
                         OR (sender_id = ?1 AND receiver_id = u.id)
                      ORDER BY sent_at DESC LIMIT 1)
                 WHERE u.id != ?1
                 ORDER BY m.sent_at IS NULL, m.sent_at DESC, u.display_name ASC",
            )?;

            let rows = stmt
                .query_map(params![user_id, day_floor_us], |row| {
                    Ok(SummaryRow {
                        peer_id: row.get(0)?,
                        peer_name: row.get(1)?,
                        peer_avatar: row.get(2)?,
                        last_text: row.get(3)?,
                        last_attachment_id: row.get(4)?,
                        last_sent_at: row.get(5)?,
                        messages_last_day: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Reactions --

    /// Increment one label's counter and return the full updated map.
    /// Returns None when the message does not exist. The increment is a
    /// single upsert statement, so racing reactions never lose updates.
    pub fn increment_reaction(
        &self,
        message_id: i64,
        label: &str,
    ) -> Result<Option<BTreeMap<String, i64>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: Option<i64> = tx
                .query_row("SELECT id FROM messages WHERE id = ?1", [message_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            tx.execute(
                "INSERT INTO reactions (message_id, label, count) VALUES (?1, ?2, 1)
                 ON CONFLICT(message_id, label) DO UPDATE SET count = count + 1",
                params![message_id, label],
            )?;

            let map = query_reaction_map(&tx, message_id)?;
            tx.commit()?;
            Ok(Some(map))
        })
    }

    /// Batch-fetch reaction counters for a set of message ids.
    pub fn reactions_for_messages(&self, message_ids: &[i64]) -> Result<Vec<ReactionCountRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=message_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id, label, count FROM reactions WHERE message_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let bindings: Vec<&dyn rusqlite::types::ToSql> = message_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(bindings.as_slice(), |row| {
                    Ok(ReactionCountRow {
                        message_id: row.get(0)?,
                        label: row.get(1)?,
                        count: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Attachments --

    pub fn insert_attachment(
        &self,
        id: &str,
        uploader_id: &str,
        mime: &str,
        size: i64,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO attachments (id, uploader_id, mime, size) VALUES (?1, ?2, ?3, ?4)",
                params![id, uploader_id, mime, size],
            )?;
            Ok(())
        })
    }

    pub fn get_attachment(&self, id: &str) -> Result<Option<AttachmentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, uploader_id, mime, size FROM attachments WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(AttachmentRow {
                            id: row.get(0)?,
                            uploader_id: row.get(1)?,
                            mime: row.get(2)?,
                            size: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn query_reaction_map(conn: &Connection, message_id: i64) -> Result<BTreeMap<String, i64>> {
    let mut stmt = conn.prepare("SELECT label, count FROM reactions WHERE message_id = ?1")?;
    let rows = stmt
        .query_map([message_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().collect())
}
