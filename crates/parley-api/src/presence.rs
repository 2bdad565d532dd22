use std::collections::HashMap;

use axum::{Extension, Json, extract::State};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use parley_types::api::{
    HeartbeatRequest, HeartbeatResponse, PresenceSnapshotRequest, PresenceSnapshotResponse,
};
use parley_types::presence::PresenceStatus;

use crate::AppState;
use crate::error::{ApiError, join_err, store_err};
use crate::middleware::Claims;

/// First heartbeat after login carries no session id; the server mints one
/// and every later call upserts the same row. Idempotent per session.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let session_id = req.session_id.unwrap_or_else(Uuid::new_v4);
    let now = Utc::now().timestamp();

    let db = state.clone();
    let uid = claims.sub.to_string();
    let sid = session_id.to_string();
    tokio::task::spawn_blocking(move || db.db.record_heartbeat(&uid, &sid, now))
        .await
        .map_err(join_err)?
        .map_err(store_err)?;

    Ok(Json(HeartbeatResponse { session_id }))
}

/// Presence is best-effort: if the store is unreachable every requested id
/// comes back Offline("unknown") rather than failing the caller.
pub async fn snapshot(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<PresenceSnapshotRequest>,
) -> Json<PresenceSnapshotResponse> {
    let now = Utc::now();

    let db = state.clone();
    let ids: Vec<String> = req.user_ids.iter().map(|id| id.to_string()).collect();
    let lookup = match tokio::task::spawn_blocking(move || db.db.latest_activity(&ids)).await {
        Ok(result) => result,
        Err(e) => Err(anyhow::anyhow!("presence lookup task failed: {}", e)),
    };

    let statuses = statuses_from_lookup(req.user_ids, lookup, now);
    Json(PresenceSnapshotResponse { statuses })
}

/// Fold the store lookup into per-user statuses. A failed lookup degrades
/// every requested id to Offline("unknown") instead of propagating.
fn statuses_from_lookup(
    user_ids: Vec<Uuid>,
    lookup: anyhow::Result<HashMap<String, i64>>,
    now: DateTime<Utc>,
) -> HashMap<Uuid, PresenceStatus> {
    let activity = match lookup {
        Ok(map) => map,
        Err(e) => {
            warn!("presence lookup degraded to offline: {:#}", e);
            HashMap::new()
        }
    };

    user_ids
        .into_iter()
        .map(|id| {
            let last = activity.get(&id.to_string()).copied();
            (id, PresenceStatus::derive(last, now))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failure_degrades_to_offline_for_all() {
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];
        let statuses =
            statuses_from_lookup(ids.clone(), Err(anyhow::anyhow!("store down")), Utc::now());

        assert_eq!(statuses.len(), 2);
        for id in &ids {
            assert_eq!(statuses.get(id), Some(&PresenceStatus::unknown()));
        }
    }

    #[test]
    fn healthy_lookup_distinguishes_online_and_absent() {
        let online = Uuid::new_v4();
        let never_seen = Uuid::new_v4();
        let now = Utc::now();

        let mut activity = HashMap::new();
        activity.insert(online.to_string(), now.timestamp() - 10);

        let statuses =
            statuses_from_lookup(vec![online, never_seen], Ok(activity), now);

        assert_eq!(statuses.get(&online), Some(&PresenceStatus::Online));
        assert_eq!(statuses.get(&never_seen), Some(&PresenceStatus::unknown()));
    }
}
