//! Client for the service-log REST API the notification service reports to.

use crate::checks::CheckError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const CLUSTER_LOGS_PATH: &str = "/api/service_logs/v1/cluster_logs";

#[derive(Debug, Error)]
pub enum ServiceLogError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code from {url}: got \"{got}\" want \"{want}\"")]
    UnexpectedStatus {
        url: String,
        got: u16,
        want: u16,
    },

    #[error("Unexpected response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Check(#[from] CheckError),
}

/// One entry of the service log. Only the `id` is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterLog {
    pub id: String,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ClusterLogList {
    items: Vec<ClusterLog>,
}

#[derive(Debug, Clone)]
pub struct ServiceLogClient {
    http: Client,
    base_url: String,
    token: String,
}

impl ServiceLogClient {
    /// `token` is sent verbatim as the `Authorization` header of every request.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ServiceLogError> {
        let http = Client::builder()
            .no_proxy()
            .build()
            .map_err(ServiceLogError::Client)?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.into(),
        })
    }

    fn cluster_logs_url(&self) -> String {
        format!("{}{CLUSTER_LOGS_PATH}", self.base_url)
    }

    /// All log entries currently stored.
    pub async fn list(&self) -> Result<Vec<ClusterLog>, ServiceLogError> {
        let url = self.cluster_logs_url();
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .send()
            .await
            .map_err(|source| ServiceLogError::Request {
                url: url.clone(),
                source,
            })?;
        expect_status(&url, response.status(), StatusCode::OK)?;

        let list: ClusterLogList = response
            .json()
            .await
            .map_err(|source| ServiceLogError::Body {
                url: url.clone(),
                source,
            })?;
        tracing::debug!(url = %url, count = list.items.len(), "Listed service log entries");
        Ok(list.items)
    }

    /// Deletes every stored entry, returning how many were deleted.
    pub async fn clear(&self) -> Result<usize, ServiceLogError> {
        let logs = self.list().await?;
        for log in &logs {
            let url = format!("{}/{}", self.cluster_logs_url(), log.id);
            let response = self
                .http
                .delete(&url)
                .header(reqwest::header::AUTHORIZATION, &self.token)
                .send()
                .await
                .map_err(|source| ServiceLogError::Request {
                    url: url.clone(),
                    source,
                })?;
            expect_status(&url, response.status(), StatusCode::NO_CONTENT)?;
        }
        tracing::info!(base_url = %self.base_url, deleted = logs.len(), "Cleared service log");
        Ok(logs.len())
    }

    /// Fails unless exactly `expected` entries are stored.
    pub async fn check_event_count(&self, expected: usize) -> Result<(), ServiceLogError> {
        let logs = self.list().await?;
        match logs.len() == expected {
            true => Ok(()),
            false => Err(CheckError::EventCount {
                retrieved: logs.len(),
                expected,
            }
            .into()),
        }
    }
}

fn expect_status(url: &str, got: StatusCode, want: StatusCode) -> Result<(), ServiceLogError> {
    match got == want {
        true => Ok(()),
        false => Err(ServiceLogError::UnexpectedStatus {
            url: url.to_owned(),
            got: got.as_u16(),
            want: want.as_u16(),
        }),
    }
}
