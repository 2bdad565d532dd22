use std::time::Duration;

use anyhow::Result;
use uuid::Uuid;

use parley_types::api::{HeartbeatRequest, HeartbeatResponse, MessageResponse};

use crate::poller::FetchMessages;

/// Every call carries a request timeout; a timed-out poll is indistinguishable
/// from a failed one and simply retries on the next tick.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub async fn heartbeat(&self, session_id: Option<Uuid>) -> Result<Uuid> {
        let resp = self
            .http
            .post(format!("{}/presence/heartbeat", self.base_url))
            .bearer_auth(&self.token)
            .json(&HeartbeatRequest { session_id })
            .send()
            .await?
            .error_for_status()?;
        let body: HeartbeatResponse = resp.json().await?;
        Ok(body.session_id)
    }
}

impl FetchMessages for HttpClient {
    async fn fetch(
        &self,
        peer_id: Uuid,
        since_us: Option<i64>,
    ) -> Result<Vec<MessageResponse>> {
        let mut req = self
            .http
            .get(format!(
                "{}/conversations/{}/messages",
                self.base_url, peer_id
            ))
            .bearer_auth(&self.token);
        if let Some(since) = since_us {
            req = req.query(&[("since_us", since)]);
        }
        let batch = req.send().await?.error_for_status()?.json().await?;
        Ok(batch)
    }
}
