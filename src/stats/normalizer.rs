//! Per-queue normalization of sub-metric counters into chart series.

use super::models::{display_name, ChartSeries, QueueList, QueueStats};

use std::collections::BTreeMap;

/// Colors assigned to sub-metric keys by index, reused cyclically.
pub const PALETTE: [&str; 8] = [
    "#10B981", // emerald
    "#F59E0B", // amber
    "#EF4444", // red
    "#3B82F6", // blue
    "#8B5CF6", // violet
    "#EC4899", // pink
    "#14B8A6", // teal
    "#6B7280", // gray
];

/// Failure sub-reasons, in display order.
pub const FAILURE_REASONS: &[&str] = &[
    "failed_timeout",
    "failed_abandon",
    "failed_inqueue_noagents",
    "failed_outqueue_noagents",
    "failed_full",
    "failed_withkey",
];

pub const WAIT_TIMES: &[&str] = &["min_wait", "avg_wait", "max_wait"];

pub const CALL_DURATIONS: &[&str] = &["min_duration", "avg_duration", "max_duration"];

/// Color for the sub-metric at `index`.
pub fn color_for(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Build one series holding the raw value of each key for a single queue.
pub fn normalize(label: &str, stats: &QueueStats, keys: &[&str]) -> ChartSeries {
    let data: Vec<f64> = keys.iter().map(|key| stats.counter(key)).collect();

    ChartSeries {
        label: label.to_string(),
        original_data: data.clone(),
        data,
        background_color: (0..keys.len()).map(|i| color_for(i).to_string()).collect(),
    }
}

/// Normalize every selected queue present in `stats`, in selection order.
pub fn breakdown(
    selected: &[String],
    stats: &BTreeMap<String, QueueStats>,
    queues: &QueueList,
    keys: &[&str],
) -> Vec<ChartSeries> {
    selected
        .iter()
        .filter_map(|key| {
            let queue_stats = stats.get(key)?;
            Some(normalize(&display_name(queues, key), queue_stats, keys))
        })
        .collect()
}
