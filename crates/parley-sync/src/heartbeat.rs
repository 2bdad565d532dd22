use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use parley_types::presence::HEARTBEAT_INTERVAL_SECS;

use crate::http::HttpClient;

/// Drives the periodic heartbeat for a logged-in client. The session id
/// minted by the first successful call is carried on every later one; a
/// failed call keeps the previous id and retries on the next tick.
pub async fn heartbeat_loop(client: HttpClient) {
    let mut ticker = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut session_id: Option<Uuid> = None;
    loop {
        ticker.tick().await;
        match client.heartbeat(session_id).await {
            Ok(sid) => session_id = Some(sid),
            Err(e) => warn!("heartbeat failed, retrying next tick: {:#}", e),
        }
    }
}
