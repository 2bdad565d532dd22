use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Owned by the identity collaborator; read-only for this subsystem.
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            display_name    TEXT NOT NULL,
            avatar          TEXT,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per (user, session). Heartbeats upsert last_activity;
        -- stale rows age out of the online window instead of being deleted.
        CREATE TABLE IF NOT EXISTS presence_sessions (
            user_id         TEXT NOT NULL REFERENCES users(id),
            session_id      TEXT NOT NULL,
            last_activity   INTEGER NOT NULL,
            PRIMARY KEY (user_id, session_id)
        );

        CREATE TABLE IF NOT EXISTS attachments (
            id              TEXT PRIMARY KEY,
            uploader_id     TEXT NOT NULL REFERENCES users(id),
            mime            TEXT NOT NULL,
            size            INTEGER NOT NULL,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- sent_at is unix microseconds, assigned by the store and strictly
        -- increasing across inserts; it is the sync cursor axis.
        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id       TEXT NOT NULL REFERENCES users(id),
            receiver_id     TEXT NOT NULL REFERENCES users(id),
            text            TEXT,
            attachment_id   TEXT REFERENCES attachments(id),
            sent_at         INTEGER NOT NULL,
            CHECK (text IS NOT NULL OR attachment_id IS NOT NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_pair
            ON messages(sender_id, receiver_id, sent_at);
        CREATE INDEX IF NOT EXISTS idx_messages_sent_at
            ON messages(sent_at);

        -- Per-label counters, not a per-user ledger.
        CREATE TABLE IF NOT EXISTS reactions (
            message_id      INTEGER NOT NULL REFERENCES messages(id),
            label           TEXT NOT NULL,
            count           INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (message_id, label)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
