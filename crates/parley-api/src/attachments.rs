use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use tokio::io::AsyncWriteExt;
use tracing::error;
use uuid::Uuid;

use parley_types::api::UploadResponse;
use parley_types::models::{ALLOWED_ATTACHMENT_MIME, MAX_ATTACHMENT_SIZE};

use crate::AppState;
use crate::error::{ApiError, join_err, store_err};
use crate::middleware::Claims;

/// Request-body ceiling for the router. Sits well above the attachment cap
/// so an oversize payload still reaches `validate_upload` and gets the
/// typed ValidationError; the limit itself only backstops unbounded bodies.
pub const UPLOAD_BODY_LIMIT: usize = 2 * MAX_ATTACHMENT_SIZE;

/// Gate on the declared media type and payload size. Runs before any disk
/// or database write; a rejected upload leaves no trace.
fn validate_upload(mime: Option<&str>, size: usize) -> Result<String, ApiError> {
    let mime = mime.ok_or_else(|| ApiError::Validation("missing content type".into()))?;
    // Strip parameters such as "; charset=binary"
    let bare = mime.split(';').next().unwrap_or(mime).trim();

    if !ALLOWED_ATTACHMENT_MIME.contains(&bare) {
        return Err(ApiError::Validation(format!(
            "unsupported attachment type '{}'",
            bare
        )));
    }
    if size == 0 {
        return Err(ApiError::Validation("empty attachment".into()));
    }
    if size > MAX_ATTACHMENT_SIZE {
        return Err(ApiError::Validation(format!(
            "attachment of {} bytes exceeds the {} byte limit",
            size, MAX_ATTACHMENT_SIZE
        )));
    }
    Ok(bare.to_string())
}

/// POST /attachments — raw image bytes with a Content-Type header; saves
/// to the upload dir, inserts the metadata row, returns the reference id.
pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let mime = validate_upload(declared, bytes.len())?;

    let attachment_id = Uuid::new_v4();
    let size = bytes.len();

    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| store_err(anyhow::anyhow!("create upload dir: {}", e)))?;

    let file_path = state.upload_dir.join(attachment_id.to_string());
    let mut file = tokio::fs::File::create(&file_path)
        .await
        .map_err(|e| store_err(anyhow::anyhow!("create {}: {}", file_path.display(), e)))?;
    file.write_all(&bytes)
        .await
        .map_err(|e| store_err(anyhow::anyhow!("write {}: {}", file_path.display(), e)))?;

    let db = state.clone();
    let aid = attachment_id.to_string();
    let uid = claims.sub.to_string();
    let stored = tokio::task::spawn_blocking(move || {
        db.db.insert_attachment(&aid, &uid, &mime, size as i64)
    })
    .await
    .map_err(join_err)?;

    if let Err(e) = stored {
        // Orphaned blob; remove it so a retry starts clean.
        if let Err(rm) = tokio::fs::remove_file(&file_path).await {
            error!("failed to remove orphaned upload {}: {}", file_path.display(), rm);
        }
        return Err(store_err(e));
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            attachment_id,
            size: size as u64,
        }),
    ))
}

/// GET /attachments/{id} — streams the stored blob with its recorded MIME.
pub async fn download(
    State(state): State<AppState>,
    Path(attachment_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let aid = attachment_id.to_string();
    let row = tokio::task::spawn_blocking(move || db.db.get_attachment(&aid))
        .await
        .map_err(join_err)?
        .map_err(store_err)?
        .ok_or(ApiError::NotFound("attachment"))?;

    let file_path = state.upload_dir.join(attachment_id.to_string());
    let bytes = tokio::fs::read(&file_path).await.map_err(|e| {
        error!("attachment {} missing on disk: {}", attachment_id, e);
        ApiError::NotFound("attachment")
    })?;

    Ok(([(header::CONTENT_TYPE, row.mime)], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_allowed_image_types() {
        for mime in ["image/jpeg", "image/png", "image/gif", "image/webp"] {
            assert!(validate_upload(Some(mime), 1024).is_ok());
        }
    }

    #[test]
    fn strips_content_type_parameters() {
        let mime = validate_upload(Some("image/png; charset=binary"), 10).unwrap();
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn rejects_disallowed_types() {
        assert!(validate_upload(Some("application/pdf"), 10).is_err());
        assert!(validate_upload(Some("image/svg+xml"), 10).is_err());
        assert!(validate_upload(None, 10).is_err());
    }

    #[test]
    fn rejects_oversize_and_empty_payloads() {
        assert!(validate_upload(Some("image/png"), 0).is_err());
        assert!(validate_upload(Some("image/png"), MAX_ATTACHMENT_SIZE).is_ok());
        // 6 MiB is over the 5 MiB cap
        assert!(validate_upload(Some("image/png"), 6 * 1024 * 1024).is_err());
    }

    #[test]
    fn oversize_payloads_fit_under_the_body_limit() {
        // A 6 MiB body must pass the router's body ceiling so the size
        // check here produces the typed validation error, not a bare 413.
        assert!(6 * 1024 * 1024 < UPLOAD_BODY_LIMIT);
        assert!(matches!(
            validate_upload(Some("image/png"), 6 * 1024 * 1024),
            Err(ApiError::Validation(_))
        ));
    }
}
