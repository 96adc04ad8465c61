//! Recall ("not managed") call list: fetched in one page, then filtered
//! and paginated in memory.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rows requested from the backend per recall fetch.
pub const RECALL_FETCH_LIMIT: usize = 200;

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Which recall calls to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecallOutcome {
    #[default]
    Lost,
    Done,
    All,
}

impl RecallOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RecallOutcome::Lost => "lost",
            RecallOutcome::Done => "done",
            RecallOutcome::All => "all",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecallQuery {
    pub hours: u32,
    pub queues: Vec<String>,
    pub outcome: RecallOutcome,
}

/// One recall row as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecallCall {
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub queuename: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub time: Value,
}

impl RecallCall {
    fn matches(&self, needle: &str) -> bool {
        [&self.cid, &self.name, &self.company, &self.queuename]
            .into_iter()
            .flatten()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecallResponse {
    #[serde(default)]
    pub rows: Vec<RecallCall>,
}

/// One page of filtered recall calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecallPage {
    pub rows: Vec<RecallCall>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
}

/// Keep rows whose caller id, name, company, or queue name contains
/// `text`, case-insensitively. Blank text keeps everything.
pub fn filter_calls(rows: Vec<RecallCall>, text: &str) -> Vec<RecallCall> {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return rows;
    }
    rows.into_iter().filter(|row| row.matches(&needle)).collect()
}

/// Slice out 1-based `page` of `page_size` rows.
///
/// A page past the end yields no rows but still reports the totals.
pub fn paginate(rows: Vec<RecallCall>, page: usize, page_size: usize) -> RecallPage {
    let page = page.max(1);
    let page_size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };
    let total = rows.len();
    let page_count = total.div_ceil(page_size);

    let rows = rows
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    RecallPage {
        rows,
        total,
        page,
        page_size,
        page_count,
    }
}
