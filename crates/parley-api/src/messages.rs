use std::collections::{BTreeMap, HashMap};

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use parley_db::models::MessageRow;
use parley_types::api::{
    ConversationSummary, MessageResponse, SendMessageRequest, SendMessageResponse,
};

use crate::AppState;
use crate::error::{ApiError, join_err, store_err};
use crate::middleware::Claims;

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    /// Sync cursor: only messages with sent_at strictly greater than this
    /// are returned. Omit for the initial uncursored load.
    pub since_us: Option<i64>,
}

fn validate_send(req: &SendMessageRequest) -> Result<(), ApiError> {
    let has_text = req.text.as_deref().is_some_and(|t| !t.trim().is_empty());
    if !has_text && req.attachment_id.is_none() {
        return Err(ApiError::Validation(
            "message needs text or an attachment".into(),
        ));
    }
    if let Some(label) = &req.reaction {
        if label.trim().is_empty() {
            return Err(ApiError::Validation("reaction label is empty".into()));
        }
    }
    Ok(())
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_send(&req)?;

    let db = state.clone();
    let sender = claims.sub.to_string();
    let peer = peer_id.to_string();
    let (id, sent_at) = tokio::task::spawn_blocking(move || {
        if db.db.get_user(&peer).map_err(store_err)?.is_none() {
            return Err(ApiError::NotFound("counterpart"));
        }
        if let Some(att) = &req.attachment_id {
            if db
                .db
                .get_attachment(&att.to_string())
                .map_err(store_err)?
                .is_none()
            {
                return Err(ApiError::Validation("unknown attachment reference".into()));
            }
        }

        db.db
            .insert_message(
                &sender,
                &peer,
                req.text.as_deref().filter(|t| !t.trim().is_empty()),
                req.attachment_id.map(|a| a.to_string()).as_deref(),
                req.reaction.as_deref(),
            )
            .map_err(store_err)
    })
    .await
    .map_err(join_err)??;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            id,
            sent_at_us: sent_at,
        }),
    ))
}

pub async fn fetch_messages(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Query(query): Query<FetchQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let db = state.clone();
    let me = claims.sub.to_string();
    let peer = peer_id.to_string();
    let since = query.since_us;

    let (rows, reaction_rows) = tokio::task::spawn_blocking(move || {
        if db.db.get_user(&peer).map_err(store_err)?.is_none() {
            return Err(ApiError::NotFound("counterpart"));
        }

        let rows = db.db.fetch_between(&me, &peer, since).map_err(store_err)?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let reaction_rows = db.db.reactions_for_messages(&ids).map_err(store_err)?;
        Ok((rows, reaction_rows))
    })
    .await
    .map_err(join_err)??;

    // Group counters by message id (cheap in-memory work, fine on the async thread)
    let mut reaction_map: HashMap<i64, BTreeMap<String, i64>> = HashMap::new();
    for r in reaction_rows {
        reaction_map
            .entry(r.message_id)
            .or_default()
            .insert(r.label, r.count);
    }

    let messages = rows
        .into_iter()
        .map(|row| {
            let reactions = reaction_map.remove(&row.id).unwrap_or_default();
            to_response(row, reactions)
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(messages))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let day_floor = Utc::now().timestamp_micros() - 24 * 3600 * 1_000_000;

    let db = state.clone();
    let me = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.conversation_summaries(&me, day_floor))
        .await
        .map_err(join_err)?
        .map_err(store_err)?;

    let summaries = rows
        .into_iter()
        .map(|row| {
            Ok(ConversationSummary {
                peer_id: parse_uuid(&row.peer_id, "peer_id")?,
                peer_name: row.peer_name,
                peer_avatar: row.peer_avatar,
                last_text: row.last_text,
                last_has_attachment: row.last_attachment_id.is_some(),
                last_sent_at_us: row.last_sent_at,
                messages_last_day: row.messages_last_day,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Json(summaries))
}

fn to_response(
    row: MessageRow,
    reactions: BTreeMap<String, i64>,
) -> Result<MessageResponse, ApiError> {
    Ok(MessageResponse {
        id: row.id,
        sender_id: parse_uuid(&row.sender_id, "sender_id")?,
        receiver_id: parse_uuid(&row.receiver_id, "receiver_id")?,
        text: row.text,
        attachment_id: row
            .attachment_id
            .as_deref()
            .map(|a| parse_uuid(a, "attachment_id"))
            .transpose()?,
        reactions,
        sent_at_us: row.sent_at,
    })
}

/// A stored id that fails to parse means the row is corrupt; fail the
/// request rather than serve the message under a bogus identity.
fn parse_uuid(value: &str, field: &str) -> Result<Uuid, ApiError> {
    value.parse().map_err(|e| {
        error!("Corrupt {} '{}': {}", field, value, e);
        ApiError::StoreUnavailable(anyhow::anyhow!("corrupt {} in store: '{}'", field, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(text: Option<&str>, attachment: bool, reaction: Option<&str>) -> SendMessageRequest {
        SendMessageRequest {
            text: text.map(String::from),
            attachment_id: attachment.then(Uuid::new_v4),
            reaction: reaction.map(String::from),
        }
    }

    #[test]
    fn send_requires_text_or_attachment() {
        assert!(validate_send(&req(None, false, None)).is_err());
        assert!(validate_send(&req(Some("   "), false, None)).is_err());
        assert!(validate_send(&req(Some("hi"), false, None)).is_ok());
        assert!(validate_send(&req(None, true, None)).is_ok());
        assert!(validate_send(&req(Some("hi"), true, None)).is_ok());
    }

    #[test]
    fn empty_reaction_label_is_rejected() {
        assert!(validate_send(&req(Some("hi"), false, Some(""))).is_err());
        assert!(validate_send(&req(Some("hi"), false, Some("wave"))).is_ok());
    }

    #[test]
    fn corrupt_stored_id_fails_the_request() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid(&id.to_string(), "sender_id").unwrap(), id);

        // A row with a mangled id must not be served under a nil identity.
        assert!(matches!(
            parse_uuid("not-a-uuid", "sender_id"),
            Err(ApiError::StoreUnavailable(_))
        ));
    }
}
