//! Flattening of queue and agent statistics into ranked entries.

use super::models::{AgentStats, QueueStats, RankEntry};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Number of entries kept by the top-N helpers.
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    fn compare(self, a: f64, b: f64) -> Ordering {
        let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        match self {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }
}

/// Whether `key` is a numeric queue id.
pub fn is_queue_id(key: &str) -> bool {
    !key.is_empty() && key.parse::<u64>().is_ok()
}

fn extract(stats: &QueueStats, keys: &[&str]) -> BTreeMap<String, f64> {
    keys.iter()
        .map(|key| (key.to_string(), stats.counter(key)))
        .collect()
}

/// One entry per numeric-keyed queue, holding the requested counters.
///
/// Non-numeric keys (summary or metadata rows) are ignored.
pub fn rank_queues(keys: &[&str], queues: &BTreeMap<String, QueueStats>) -> Vec<RankEntry> {
    queues
        .iter()
        .filter(|(queue, _)| is_queue_id(queue))
        .map(|(queue, stats)| RankEntry {
            name: queue.clone(),
            queue: queue.clone(),
            values: extract(stats, keys),
        })
        .collect()
}

/// One entry per agent and numeric queue id, indexed by insertion order.
pub fn rank_agents(keys: &[&str], agents: &AgentStats) -> BTreeMap<usize, RankEntry> {
    let mut out = BTreeMap::new();
    let mut counter = 0usize;

    for (agent, queues) in &agents.0 {
        for (queue, stats) in queues.iter().filter(|(queue, _)| is_queue_id(queue)) {
            out.insert(
                counter,
                RankEntry {
                    name: agent.clone(),
                    queue: queue.clone(),
                    values: extract(stats, keys),
                },
            );
            counter += 1;
        }
    }

    out
}

/// Sort items by `value` in `direction` and keep the first [`TOP_N`].
///
/// For a flat numeric list pass `|v| *v`.
pub fn top_n<T, I, F>(items: I, direction: SortDirection, value: F) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    F: Fn(&T) -> f64,
{
    let mut items: Vec<T> = items.into_iter().collect();
    items.sort_by(|a, b| direction.compare(value(a), value(b)));
    items.truncate(TOP_N);
    items
}

/// Rank entries by one value key and keep the first [`TOP_N`].
pub fn top_entries<I>(entries: I, key: &str, direction: SortDirection) -> Vec<RankEntry>
where
    I: IntoIterator<Item = RankEntry>,
{
    top_n(entries, direction, |entry| entry.value(key))
}
