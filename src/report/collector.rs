use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::SecurityEvent;

/// Outcome of validating a candidate session id against the collector.
/// These are the only errors a registering user ever sees, so they stay
/// typed instead of collapsing into `anyhow`.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("the collector rejected this session id")]
    InvalidSessionId,
    #[error("the collector is unreachable: {0}")]
    CollectorUnreachable(String),
    #[error("the collector returned an unexpected status: {0}")]
    CollectorError(u16),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub id: String,
    /// Kept as the collector's raw string; the lifecycle parses it
    /// leniently since the server omits a timezone offset.
    pub ends_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnippetType {
    Copied,
    Pasted,
}

/// Wire body for `POST {base}/snippet`, the collector's clipboard channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetPayload {
    pub session: String,
    pub client_name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub snippet_type: SnippetType,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CollectorClient {
    http: reqwest::Client,
    base_url: String,
}

impl CollectorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build collector HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub async fn validate_session(
        &self,
        session_id: &str,
    ) -> Result<SessionDescriptor, RegistrationError> {
        let response = self
            .http
            .get(self.endpoint(&format!("session/{session_id}")))
            .send()
            .await
            .map_err(|err| RegistrationError::CollectorUnreachable(err.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<SessionDescriptor>()
                .await
                .map_err(|_| RegistrationError::CollectorError(status.as_u16())),
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => {
                Err(RegistrationError::InvalidSessionId)
            }
            other => Err(RegistrationError::CollectorError(other.as_u16())),
        }
    }

    /// Best-effort liveness check; any transport or server failure reads as
    /// "not active".
    pub async fn session_active(&self, session_id: &str) -> bool {
        self.http
            .get(self.endpoint(&format!("session/active/{session_id}")))
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }

    pub async fn post_snippet(&self, payload: &SnippetPayload) -> reqwest::Result<StatusCode> {
        self.http
            .post(self.endpoint("snippet"))
            .json(payload)
            .send()
            .await
            .map(|response| response.status())
    }

    pub async fn post_event(&self, event: &SecurityEvent) -> reqwest::Result<StatusCode> {
        self.http
            .post(self.endpoint("event"))
            .json(event)
            .send()
            .await
            .map(|response| response.status())
    }
}
