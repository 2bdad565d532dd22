/// Database row types — these map directly to SQLite rows.
/// Distinct from parley-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

pub struct MessageRow {
    pub id: i64,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: Option<String>,
    pub attachment_id: Option<String>,
    pub sent_at: i64,
}

pub struct ReactionCountRow {
    pub message_id: i64,
    pub label: String,
    pub count: i64,
}

pub struct AttachmentRow {
    pub id: String,
    pub uploader_id: String,
    pub mime: String,
    pub size: i64,
}

/// One conversation listing entry; LEFT JOIN result, so the message
/// fields are absent for counterparts with no history yet.
pub struct SummaryRow {
    pub peer_id: String,
    pub peer_name: String,
    pub peer_avatar: Option<String>,
    pub last_text: Option<String>,
    pub last_attachment_id: Option<String>,
    pub last_sent_at: Option<i64>,
    pub messages_last_day: i64,
}
