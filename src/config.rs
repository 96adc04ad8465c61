//! Configuration module for queueboard.
//!
//! Loads configuration from environment variables with sensible defaults.

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::env;
use std::time::Duration;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Base URL of the astproxy backend (default: "http://127.0.0.1:8179")
    pub astproxy_url: String,
    /// Value of the Authorization header sent to the backend
    pub auth_token: Option<String>,
    /// Seconds between polls (default: 20)
    pub poll_interval: u64,
    /// Per-request timeout in seconds (default: 10)
    pub request_timeout: u64,
    /// Hour of day (UTC) the history window starts (default: 0)
    pub dashboard_start_hour: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            astproxy_url: "http://127.0.0.1:8179".to_string(),
            auth_token: None,
            poll_interval: 20,
            request_timeout: 10,
            dashboard_start_hour: 0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `QUEUEBOARD_HTTP_PORT`: HTTP port (default: 8080)
    /// - `QUEUEBOARD_ASTPROXY_URL`: backend base URL
    /// - `QUEUEBOARD_AUTH_TOKEN`: Authorization header value (default: none)
    /// - `QUEUEBOARD_POLL_INTERVAL`: poll interval in seconds (default: 20)
    /// - `QUEUEBOARD_REQUEST_TIMEOUT`: request timeout in seconds (default: 10)
    /// - `QUEUEBOARD_DASHBOARD_START_HOUR`: history window start hour (default: 0)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = lookup("QUEUEBOARD_HTTP_PORT").and_then(|s| s.parse().ok()) {
            cfg.http_port = port;
        }

        if let Some(url) = lookup("QUEUEBOARD_ASTPROXY_URL") {
            cfg.astproxy_url = url;
        }

        cfg.auth_token = lookup("QUEUEBOARD_AUTH_TOKEN").filter(|t| !t.is_empty());

        if let Some(secs) = lookup("QUEUEBOARD_POLL_INTERVAL").and_then(|s| s.parse().ok()) {
            if secs > 0 {
                cfg.poll_interval = secs;
            }
        }

        if let Some(secs) = lookup("QUEUEBOARD_REQUEST_TIMEOUT").and_then(|s| s.parse().ok()) {
            if secs > 0 {
                cfg.request_timeout = secs;
            }
        }

        if let Some(hour) = lookup("QUEUEBOARD_DASHBOARD_START_HOUR").and_then(|s| s.parse().ok()) {
            if hour < 24 {
                cfg.dashboard_start_hour = hour;
            }
        }

        cfg
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Start of the history window containing `now`: the most recent
    /// occurrence of the configured hour.
    pub fn dashboard_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now
            .with_hour(self.dashboard_start_hour)
            .and_then(|t| t.with_minute(0))
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);

        if today > now {
            today - ChronoDuration::days(1)
        } else {
            today
        }
    }
}
