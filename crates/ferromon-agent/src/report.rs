use ferromon_common::AgentSnapshot;
use std::time::Duration;
use thiserror::Error;

/// Deadline for one push; a slow server must not stall the tick loop.
const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Pushes agent snapshots to the server's collect endpoint.
pub struct Reporter {
    client: reqwest::Client,
    endpoint: String,
}

impl Reporter {
    pub fn new(server_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/metrics/collect", server_url.trim_end_matches('/')),
        }
    }

    pub async fn push(&self, snapshot: &AgentSnapshot) -> Result<(), ReportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(PUSH_TIMEOUT)
            .json(snapshot)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ReportError::Status(response.status()));
        }
        Ok(())
    }
}
