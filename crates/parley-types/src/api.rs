use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::presence::PresenceStatus;

// -- Presence --

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatRequest {
    /// Absent on the first heartbeat after login; the server mints a session
    /// id and the client carries it on every subsequent call.
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceSnapshotRequest {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PresenceSnapshotResponse {
    pub statuses: HashMap<Uuid, PresenceStatus>,
}

// -- Messages --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    pub attachment_id: Option<Uuid>,
    /// Seeds the new message's reaction map with `{label: 1}`.
    pub reaction: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub id: i64,
    pub sent_at_us: i64,
}

/// One direct message as served to a polling client. `sent_at_us` is the
/// sync cursor axis: unix microseconds, strictly increasing per store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub text: Option<String>,
    pub attachment_id: Option<Uuid>,
    pub reactions: BTreeMap<String, i64>,
    pub sent_at_us: i64,
}

// -- Conversations --

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub peer_id: Uuid,
    pub peer_name: String,
    pub peer_avatar: Option<String>,
    pub last_text: Option<String>,
    pub last_has_attachment: bool,
    pub last_sent_at_us: Option<i64>,
    /// Messages exchanged with this counterpart in the trailing 24 hours.
    pub messages_last_day: i64,
}

// -- Reactions --

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReactRequest {
    pub label: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReactResponse {
    pub reactions: BTreeMap<String, i64>,
}

// -- Attachments --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub attachment_id: Uuid,
    pub size: u64,
}
