use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user with a heartbeat inside this window counts as online.
pub const ONLINE_WINDOW_SECS: i64 = 5 * 60;

/// How often an active client should send a heartbeat.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Offline { last_seen: String },
}

impl PresenceStatus {
    /// Derive a status from the most recent heartbeat, if any.
    ///
    /// `last_activity` is unix seconds. A user with no presence row at all,
    /// or whose store lookup failed, gets `Offline { "unknown" }`.
    pub fn derive(last_activity: Option<i64>, now: DateTime<Utc>) -> Self {
        let Some(last) = last_activity else {
            return Self::unknown();
        };
        let diff = now.timestamp() - last;
        if diff < ONLINE_WINDOW_SECS {
            PresenceStatus::Online
        } else {
            PresenceStatus::Offline {
                last_seen: last_seen_label(last, diff),
            }
        }
    }

    pub fn unknown() -> Self {
        PresenceStatus::Offline {
            last_seen: "unknown".to_string(),
        }
    }
}

/// Bucketed "last seen" label: minutes under an hour, hours under a day,
/// calendar date beyond that.
fn last_seen_label(last_activity: i64, diff_secs: i64) -> String {
    if diff_secs < 3600 {
        format!("{} minutes ago", diff_secs / 60)
    } else if diff_secs < 86400 {
        format!("{} hours ago", diff_secs / 3600)
    } else {
        match DateTime::<Utc>::from_timestamp(last_activity, 0) {
            Some(dt) => dt.format("%b %-d").to_string(),
            None => "unknown".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn inside_window_is_online() {
        let status = PresenceStatus::derive(Some(now().timestamp() - 299), now());
        assert_eq!(status, PresenceStatus::Online);
    }

    #[test]
    fn just_past_window_is_offline_minutes() {
        let status = PresenceStatus::derive(Some(now().timestamp() - 301), now());
        assert_eq!(
            status,
            PresenceStatus::Offline {
                last_seen: "5 minutes ago".to_string()
            }
        );
    }

    #[test]
    fn hours_bucket() {
        let status = PresenceStatus::derive(Some(now().timestamp() - 7200), now());
        assert_eq!(
            status,
            PresenceStatus::Offline {
                last_seen: "2 hours ago".to_string()
            }
        );
    }

    #[test]
    fn old_heartbeat_becomes_calendar_date() {
        let status = PresenceStatus::derive(Some(now().timestamp() - 3 * 86400), now());
        assert_eq!(
            status,
            PresenceStatus::Offline {
                last_seen: "Jun 12".to_string()
            }
        );
    }

    #[test]
    fn no_heartbeat_is_unknown() {
        assert_eq!(PresenceStatus::derive(None, now()), PresenceStatus::unknown());
    }
}
