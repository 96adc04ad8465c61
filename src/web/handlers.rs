//! HTTP request handlers.

use super::AppState;
use crate::client::{filter_calls, paginate, RecallOutcome, RecallQuery, DEFAULT_PAGE_SIZE};
use crate::poller::{PollOutcome, Snapshot};
use crate::stats::{
    aggregate_history, breakdown, is_queue_id, rank_agents, rank_queues, sort_queue_keys,
    summarize, top_entries, SortDirection, CALL_DURATIONS, FAILURE_REASONS, WAIT_TIMES,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

/// Latest snapshot, or 503 until the first poll succeeds.
async fn current_snapshot(state: &AppState) -> Result<Arc<Snapshot>, Response> {
    let dashboard = state.poller.state();
    let dashboard = dashboard.read().await;

    match &dashboard.snapshot {
        Some(snapshot) => Ok(snapshot.clone()),
        None => {
            let message = match &dashboard.last_error {
                Some(e) => format!("No statistics available yet: {}", e),
                None => "No statistics available yet".to_string(),
            };
            Err((StatusCode::SERVICE_UNAVAILABLE, message).into_response())
        }
    }
}

/// Split a comma-separated list, dropping blanks and duplicates.
fn split_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out
}

/// Selected queue ids sorted numerically; every numeric queue when the
/// parameter is absent or blank. Entries that are not queue ids are dropped.
pub fn select_queues(param: Option<&str>, snapshot: &Snapshot) -> Vec<String> {
    match param.map(split_list) {
        Some(keys) if !keys.is_empty() => {
            let mut keys: Vec<String> = keys.into_iter().filter(|k| is_queue_id(k)).collect();
            sort_queue_keys(&mut keys);
            keys
        }
        _ => snapshot.queue_keys(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectionQuery {
    #[serde(default)]
    pub queues: Option<String>,
}

// ============================================================================
// API: Queues
// ============================================================================

#[derive(Debug, Serialize)]
pub struct QueueOverview {
    pub queue: String,
    pub name: String,
    pub members: usize,
    pub waiting: usize,
    pub connected: usize,
}

pub async fn handle_get_queues(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = match current_snapshot(&state).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let queues: Vec<QueueOverview> = snapshot
        .queue_keys()
        .into_iter()
        .filter_map(|key| {
            let q = snapshot.queues.get(&key)?;
            Some(QueueOverview {
                name: crate::stats::display_name(&snapshot.queues, &key),
                members: q.member_count(),
                waiting: q.waiting_count(),
                connected: q.connected_count(),
                queue: key,
            })
        })
        .collect();

    Json(queues).into_response()
}

// ============================================================================
// API: Charts
// ============================================================================

pub async fn handle_summary(
    State(state): State<AppState>,
    Query(query): Query<SelectionQuery>,
) -> impl IntoResponse {
    let snapshot = match current_snapshot(&state).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let selected = select_queues(query.queues.as_deref(), &snapshot);
    Json(summarize(&selected, &snapshot.stats, &snapshot.queues)).into_response()
}

/// Sub-metric keys of a breakdown family.
pub fn family_keys(family: &str) -> Option<&'static [&'static str]> {
    match family {
        "failures" => Some(FAILURE_REASONS),
        "waits" => Some(WAIT_TIMES),
        "durations" => Some(CALL_DURATIONS),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub struct BreakdownResponse {
    pub keys: &'static [&'static str],
    pub series: Vec<crate::stats::ChartSeries>,
}

pub async fn handle_breakdown(
    State(state): State<AppState>,
    Path(family): Path<String>,
    Query(query): Query<SelectionQuery>,
) -> impl IntoResponse {
    let Some(keys) = family_keys(&family) else {
        return (StatusCode::BAD_REQUEST, format!("Unknown breakdown: {}", family)).into_response();
    };

    let snapshot = match current_snapshot(&state).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let selected = select_queues(query.queues.as_deref(), &snapshot);
    Json(BreakdownResponse {
        keys,
        series: breakdown(&selected, &snapshot.stats, &snapshot.queues, keys),
    })
    .into_response()
}

pub async fn handle_history(
    State(state): State<AppState>,
    Query(query): Query<SelectionQuery>,
) -> impl IntoResponse {
    let snapshot = match current_snapshot(&state).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let selected = select_queues(query.queues.as_deref(), &snapshot);
    let start = state.config.dashboard_start(Utc::now());

    Json(aggregate_history(
        &selected,
        &snapshot.history,
        &snapshot.queues,
        start,
    ))
    .into_response()
}

// ============================================================================
// API: Rankings
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RankQuery {
    #[serde(default)]
    pub keys: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub dir: Option<SortDirection>,
}

impl RankQuery {
    /// Requested keys (default `tot`) and the key to sort on (default the
    /// first requested key).
    fn resolve(&self) -> (Vec<String>, String) {
        let mut keys = self.keys.as_deref().map(split_list).unwrap_or_default();
        if keys.is_empty() {
            keys.push("tot".to_string());
        }

        let sort = self
            .sort
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| keys[0].clone());

        if !keys.contains(&sort) {
            keys.push(sort.clone());
        }

        (keys, sort)
    }
}

pub async fn handle_rank_queues(
    State(state): State<AppState>,
    Query(query): Query<RankQuery>,
) -> impl IntoResponse {
    let snapshot = match current_snapshot(&state).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let (keys, sort) = query.resolve();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    let mut entries = rank_queues(&keys, &snapshot.stats);
    for entry in &mut entries {
        entry.name = crate::stats::display_name(&snapshot.queues, &entry.queue);
    }

    Json(top_entries(entries, &sort, query.dir.unwrap_or_default())).into_response()
}

pub async fn handle_rank_agents(
    State(state): State<AppState>,
    Query(query): Query<RankQuery>,
) -> impl IntoResponse {
    let snapshot = match current_snapshot(&state).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let (keys, sort) = query.resolve();
    let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
    let entries = rank_agents(&keys, &snapshot.agents);

    Json(top_entries(
        entries.into_values(),
        &sort,
        query.dir.unwrap_or_default(),
    ))
    .into_response()
}

// ============================================================================
// API: Recall
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct RecallParams {
    #[serde(default)]
    pub hours: Option<u32>,
    #[serde(default)]
    pub queues: Option<String>,
    #[serde(default)]
    pub outcome: Option<RecallOutcome>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

pub async fn handle_recall(
    State(state): State<AppState>,
    Query(params): Query<RecallParams>,
) -> impl IntoResponse {
    let snapshot = match current_snapshot(&state).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let query = RecallQuery {
        hours: params.hours.unwrap_or(12).max(1),
        queues: select_queues(params.queues.as_deref(), &snapshot),
        outcome: params.outcome.unwrap_or_default(),
    };

    let response = match state.client.recall(&query).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Recall fetch failed: {}", e);
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };

    let rows = filter_calls(response.rows, params.filter.as_deref().unwrap_or(""));
    Json(paginate(
        rows,
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    ))
    .into_response()
}

// ============================================================================
// API: Alarms and status
// ============================================================================

pub async fn handle_alarms(State(state): State<AppState>) -> impl IntoResponse {
    match current_snapshot(&state).await {
        Ok(snapshot) => Json(snapshot.alarms.clone()).into_response(),
        Err(resp) => resp,
    }
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    let loading = state.poller.is_loading();
    let dashboard = state.poller.state();
    let report = dashboard.read().await.report(loading);
    Json(report)
}

pub async fn handle_refresh(State(state): State<AppState>) -> impl IntoResponse {
    match state.poller.refresh().await {
        PollOutcome::Applied(_) => {
            let dashboard = state.poller.state();
            let report = dashboard.read().await.report(state.poller.is_loading());
            Json(report).into_response()
        }
        PollOutcome::Stale(_) | PollOutcome::Skipped => {
            (StatusCode::ACCEPTED, "Superseded by a newer refresh").into_response()
        }
        PollOutcome::Failed(e) => (StatusCode::BAD_GATEWAY, e).into_response(),
    }
}
