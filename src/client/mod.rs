//! HTTP client for the astproxy queue manager API.
//!
//! All endpoints are read-only JSON GETs under `/astproxy/`.

mod recall;

pub use recall::*;

use crate::stats::{
    decode_keyed, is_queue_id, AgentStats, QueueHistory, QueueList, QueueStats, QueueStatsRecord,
};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Client error types.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("backend returned status {status} for {path}")]
    Status { status: u16, path: String },
    #[error("invalid response from {path}: {message}")]
    Decode { path: String, message: String },
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Client for one astproxy backend.
#[derive(Debug, Clone)]
pub struct AstproxyClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl AstproxyClient {
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "astproxy URL must be http(s): {:?}",
                base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            auth_token,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/astproxy/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut request = self.http.get(self.url(path));
        if let Some(token) = &self.auth_token {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.timeout)
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.timeout)
            } else {
                ClientError::Decode {
                    path: path.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// `GET qmanager_queues`
    pub async fn queues(&self) -> Result<QueueList, ClientError> {
        let raw: Value = self.get_json("qmanager_queues").await?;
        Ok(decode_keyed(raw))
    }

    /// `GET qmanager_qstats/{queue_id}`
    pub async fn queue_stats(&self, queue_id: &str) -> Result<QueueStats, ClientError> {
        let record: QueueStatsRecord = self
            .get_json(&format!("qmanager_qstats/{}", queue_id))
            .await?;
        Ok(record.qstats)
    }

    /// `GET qmanager_astats`
    pub async fn agent_stats(&self) -> Result<AgentStats, ClientError> {
        self.get_json("qmanager_astats").await
    }

    /// `GET qmanager_qcalls_hist`
    pub async fn history(&self) -> Result<BTreeMap<String, QueueHistory>, ClientError> {
        let raw: Value = self.get_json("qmanager_qcalls_hist").await?;
        Ok(decode_keyed(raw))
    }

    /// Path of a recall request, or `None` when no numeric queue id is
    /// selected. Anything that is not a queue id never reaches the URL.
    fn recall_path(query: &RecallQuery) -> Option<String> {
        let queues: Vec<&str> = query
            .queues
            .iter()
            .map(String::as_str)
            .filter(|q| is_queue_id(q))
            .collect();
        if queues.is_empty() {
            return None;
        }

        Some(format!(
            "qmanager_queue_recall/{}/{}/{}?limit={}&offset=0",
            query.hours,
            queues.join(","),
            query.outcome.as_str(),
            RECALL_FETCH_LIMIT
        ))
    }

    /// `GET qmanager_queue_recall/{hours}/{queues}/{outcome}`, one page of
    /// up to [`RECALL_FETCH_LIMIT`] rows.
    pub async fn recall(&self, query: &RecallQuery) -> Result<RecallResponse, ClientError> {
        match Self::recall_path(query) {
            Some(path) => self.get_json(&path).await,
            None => Ok(RecallResponse::default()),
        }
    }

    /// `GET qalarms`
    pub async fn alarms(&self) -> Result<Value, ClientError> {
        self.get_json("qalarms").await
    }
}
