use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Users are owned by the identity collaborator. This subsystem only ever
/// reads them — for conversation listings and counterpart checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub avatar: Option<String>,
}

/// Metadata for an uploaded attachment blob. The bytes themselves live on
/// disk under the upload dir; messages reference attachments by id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub mime: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Media types an attachment upload may declare.
pub const ALLOWED_ATTACHMENT_MIME: &[&str] =
    &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Attachment uploads above this size are rejected before any write.
pub const MAX_ATTACHMENT_SIZE: usize = 5 * 1024 * 1024;
