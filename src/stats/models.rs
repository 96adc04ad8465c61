//! Statistics model types.
//!
//! Backend payloads are loosely typed: counters arrive as numbers, numeric
//! strings, nulls, or not at all. Everything numeric is read through
//! [`coerce_counter`] so the aggregation code only ever sees finite,
//! non-negative values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Coerce a loosely typed JSON value into a counter.
///
/// Numbers and numeric strings are accepted; anything else, including
/// negative and non-finite values, reads as `0`.
pub fn coerce_counter(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };

    if n.is_finite() && n > 0.0 {
        n
    } else {
        0.0
    }
}

fn lenient_counter<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_counter(&value))
}

/// Strings pass through, numbers are formatted, anything else is empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// A list of history points. Non-arrays read as empty; points that do not
/// decode (for example an unparseable `fullDate`) are dropped.
fn lenient_points<'de, D>(deserializer: D) -> Result<Vec<HistoryPoint>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

/// Decode a keyed backend map, skipping entries that do not decode.
///
/// A non-object payload yields an empty map.
pub fn decode_keyed<T: DeserializeOwned>(value: Value) -> BTreeMap<String, T> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(key, entry)| match serde_json::from_value(entry) {
                Ok(decoded) => Some((key, decoded)),
                Err(e) => {
                    tracing::warn!("Skipping malformed entry {}: {}", key, e);
                    None
                }
            })
            .collect(),
        _ => BTreeMap::new(),
    }
}

/// Named queue counters used by the cross-queue summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    Total,
    Failed,
    Invalid,
    ProcessedLessSla,
    AvgRecallTime,
}

impl StatField {
    /// Key of this counter in the backend payload.
    pub fn key(self) -> &'static str {
        match self {
            StatField::Total => "tot",
            StatField::Failed => "tot_failed",
            StatField::Invalid => "tot_null",
            StatField::ProcessedLessSla => "processed_less_sla",
            StatField::AvgRecallTime => "avg_recall_time",
        }
    }
}

/// Raw counters of one queue (or one agent in one queue) for the
/// reporting period.
///
/// Deserializes from any JSON value; non-objects become an empty bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueueStats(BTreeMap<String, Value>);

impl QueueStats {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map.into_iter().collect()),
            _ => Self::default(),
        }
    }

    /// Read a counter by its payload key. Missing or malformed reads as 0.
    pub fn counter(&self, key: &str) -> f64 {
        self.0.get(key).map(coerce_counter).unwrap_or(0.0)
    }

    pub fn get(&self, field: StatField) -> f64 {
        self.counter(field.key())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for QueueStats {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for QueueStats {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Value::from(v)))
                .collect(),
        )
    }
}

/// Response of `qmanager_qstats/{queueId}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueStatsRecord {
    #[serde(default)]
    pub qstats: QueueStats,
}

/// Per-agent statistics: agent name → queue id → counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AgentStats(pub BTreeMap<String, BTreeMap<String, QueueStats>>);

impl<'de> Deserialize<'de> for AgentStats {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let agents = match Value::deserialize(deserializer)? {
            Value::Object(map) => map
                .into_iter()
                .filter_map(|(agent, queues)| match queues {
                    Value::Object(queues) => Some((
                        agent,
                        queues
                            .into_iter()
                            .map(|(queue, stats)| (queue, QueueStats::from_value(stats)))
                            .collect(),
                    )),
                    _ => None,
                })
                .collect(),
            _ => BTreeMap::new(),
        };
        Ok(Self(agents))
    }
}

/// A queue as listed by `qmanager_queues`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDescriptor {
    #[serde(default, deserialize_with = "lenient_string")]
    pub queue: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default)]
    pub members: Value,
    #[serde(default)]
    pub waiting_callers: Value,
    #[serde(default)]
    pub connected_calls: Value,
}

/// Queue key → descriptor.
pub type QueueList = BTreeMap<String, QueueDescriptor>;

fn entry_count(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => 0,
    }
}

impl QueueDescriptor {
    pub fn member_count(&self) -> usize {
        entry_count(&self.members)
    }

    pub fn waiting_count(&self) -> usize {
        entry_count(&self.waiting_callers)
    }

    pub fn connected_count(&self) -> usize {
        entry_count(&self.connected_calls)
    }
}

/// Display name of a queue, falling back to its key.
pub fn display_name(queues: &QueueList, key: &str) -> String {
    queues
        .get(key)
        .map(|q| q.name.trim())
        .filter(|name| !name.is_empty())
        .unwrap_or(key)
        .to_string()
}

/// Sort queue keys by numeric queue id. Non-numeric keys go last, in
/// lexical order.
pub fn sort_queue_keys(keys: &mut [String]) {
    keys.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
}

/// The normalized unit handed to chart renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub label: String,
    pub data: Vec<f64>,
    pub background_color: Vec<String>,
    pub original_data: Vec<f64>,
}

/// One historical sample for one queue and one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub full_date: DateTime<Utc>,
    #[serde(default)]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_counter")]
    pub value: f64,
}

/// Historical series of one queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueHistory {
    #[serde(default, deserialize_with = "lenient_points")]
    pub answered: Vec<HistoryPoint>,
    #[serde(default, deserialize_with = "lenient_points")]
    pub failed: Vec<HistoryPoint>,
    #[serde(default, deserialize_with = "lenient_points")]
    pub invalid: Vec<HistoryPoint>,
    #[serde(default, deserialize_with = "lenient_points")]
    pub total: Vec<HistoryPoint>,
}

/// One flattened statistic row for top-N displays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankEntry {
    pub name: String,
    pub queue: String,
    pub values: BTreeMap<String, f64>,
}

impl RankEntry {
    pub fn value(&self, key: &str) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_counter() {
        assert_eq!(coerce_counter(&json!(12)), 12.0);
        assert_eq!(coerce_counter(&json!(" 7.5 ")), 7.5);
        assert_eq!(coerce_counter(&json!(null)), 0.0);
        assert_eq!(coerce_counter(&json!("n/a")), 0.0);
        assert_eq!(coerce_counter(&json!(-3)), 0.0);
        assert_eq!(coerce_counter(&json!({"nested": 1})), 0.0);
    }

    #[test]
    fn test_queue_stats_missing_field() {
        let stats: QueueStats = serde_json::from_value(json!({"tot": 10})).unwrap();
        assert_eq!(stats.get(StatField::Total), 10.0);
        assert_eq!(stats.get(StatField::Failed), 0.0);
    }

    #[test]
    fn test_queue_stats_from_non_object() {
        let stats: QueueStats = serde_json::from_value(json!([1, 2, 3])).unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn test_agent_stats_skips_non_object_agents() {
        let agents: AgentStats = serde_json::from_value(json!({
            "alice": {"401": {"tot": 3}},
            "meta": 42
        }))
        .unwrap();
        assert_eq!(agents.0.len(), 1);
        assert_eq!(agents.0["alice"]["401"].counter("tot"), 3.0);
    }

    #[test]
    fn test_history_point_lenient_value() {
        let point: HistoryPoint = serde_json::from_value(json!({
            "fullDate": "2024-01-01T10:00:00Z",
            "date": "10:00",
            "value": "4"
        }))
        .unwrap();
        assert_eq!(point.value, 4.0);

        let point: HistoryPoint = serde_json::from_value(json!({
            "fullDate": "2024-01-01T10:00:00Z",
            "value": null
        }))
        .unwrap();
        assert_eq!(point.value, 0.0);
    }

    #[test]
    fn test_history_null_series_reads_as_empty() {
        let histories: BTreeMap<String, QueueHistory> = serde_json::from_value(json!({
            "401": {"answered": [], "failed": [], "invalid": null, "total": []}
        }))
        .unwrap();
        assert!(histories["401"].invalid.is_empty());
    }

    #[test]
    fn test_history_drops_undecodable_points() {
        let history: QueueHistory = serde_json::from_value(json!({
            "total": [
                {"fullDate": "2024-01-01T10:00:00Z", "value": 3},
                {"fullDate": "yesterday", "value": 9},
                {"value": 1},
                "garbage"
            ],
            "failed": {"not": "a list"}
        }))
        .unwrap();
        assert_eq!(history.total.len(), 1);
        assert_eq!(history.total[0].value, 3.0);
        assert!(history.failed.is_empty());
        assert!(history.answered.is_empty());
    }

    #[test]
    fn test_descriptor_null_name() {
        let queues: QueueList = serde_json::from_value(json!({
            "401": {"queue": 401, "name": null, "members": null}
        }))
        .unwrap();
        assert_eq!(queues["401"].queue, "401");
        assert_eq!(queues["401"].name, "");
        assert_eq!(queues["401"].member_count(), 0);
        assert_eq!(display_name(&queues, "401"), "401");
    }

    #[test]
    fn test_decode_keyed_skips_malformed_entries() {
        let histories: BTreeMap<String, QueueHistory> = decode_keyed(json!({
            "401": {"total": [{"fullDate": "2024-01-01T10:00:00Z", "value": 2}]},
            "402": null,
            "403": "n/a"
        }));
        assert_eq!(histories.len(), 1);
        assert_eq!(histories["401"].total.len(), 1);

        let queues: QueueList = decode_keyed(json!([1, 2]));
        assert!(queues.is_empty());
    }

    #[test]
    fn test_sort_queue_keys() {
        let mut keys = vec![
            "402".to_string(),
            "general".to_string(),
            "40".to_string(),
            "1000".to_string(),
        ];
        sort_queue_keys(&mut keys);
        assert_eq!(keys, vec!["40", "402", "1000", "general"]);
    }

    #[test]
    fn test_display_name_fallback() {
        let mut queues = QueueList::new();
        queues.insert(
            "401".to_string(),
            QueueDescriptor {
                queue: "401".to_string(),
                name: "Support".to_string(),
                ..Default::default()
            },
        );
        queues.insert("402".to_string(), QueueDescriptor::default());

        assert_eq!(display_name(&queues, "401"), "Support");
        assert_eq!(display_name(&queues, "402"), "402");
        assert_eq!(display_name(&queues, "999"), "999");
    }

    #[test]
    fn test_descriptor_counts() {
        let queue: QueueDescriptor = serde_json::from_value(json!({
            "queue": "401",
            "name": "Support",
            "members": {"201": {}, "202": {}},
            "waitingCallers": [{"num": "555"}],
        }))
        .unwrap();
        assert_eq!(queue.member_count(), 2);
        assert_eq!(queue.waiting_count(), 1);
        assert_eq!(queue.connected_count(), 0);
    }
}
