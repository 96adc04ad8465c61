//! Cross-queue aggregation: share of each selected queue in a counter's
//! total across the selection.

use super::models::{display_name, ChartSeries, QueueList, QueueStats, StatField};
use super::normalizer::color_for;

use serde::Serialize;
use std::collections::BTreeMap;

/// Percentage series of one counter across the selected queues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossQueueSeries {
    pub field: StatField,
    pub total: f64,
    pub series: Vec<ChartSeries>,
}

/// The five metric families shown on the summary chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub total_calls: CrossQueueSeries,
    pub calls_before_sla: CrossQueueSeries,
    pub failed_calls: CrossQueueSeries,
    pub callback_time: CrossQueueSeries,
    pub invalid_calls: CrossQueueSeries,
}

/// `value / total * 100`, or `0` when the total is zero.
pub fn percentage(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total * 100.0
    } else {
        0.0
    }
}

/// Compute each selected queue's share of `field`.
///
/// Output follows `selected` order. Queues missing from `stats` are
/// skipped and do not contribute to the total.
pub fn aggregate(
    selected: &[String],
    stats: &BTreeMap<String, QueueStats>,
    queues: &QueueList,
    field: StatField,
) -> CrossQueueSeries {
    let present: Vec<(&String, f64)> = selected
        .iter()
        .filter_map(|key| stats.get(key).map(|s| (key, s.get(field))))
        .collect();

    let total: f64 = present.iter().map(|(_, value)| value).sum();

    let series = present
        .iter()
        .enumerate()
        .map(|(i, (key, value))| ChartSeries {
            label: display_name(queues, key),
            data: vec![percentage(*value, total)],
            background_color: vec![color_for(i).to_string()],
            original_data: vec![*value],
        })
        .collect();

    CrossQueueSeries {
        field,
        total,
        series,
    }
}

/// Aggregate every summary metric family over the same selection.
pub fn summarize(
    selected: &[String],
    stats: &BTreeMap<String, QueueStats>,
    queues: &QueueList,
) -> QueueSummary {
    QueueSummary {
        total_calls: aggregate(selected, stats, queues, StatField::Total),
        calls_before_sla: aggregate(selected, stats, queues, StatField::ProcessedLessSla),
        failed_calls: aggregate(selected, stats, queues, StatField::Failed),
        callback_time: aggregate(selected, stats, queues, StatField::AvgRecallTime),
        invalid_calls: aggregate(selected, stats, queues, StatField::Invalid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats_map(entries: &[(&str, f64)]) -> BTreeMap<String, QueueStats> {
        entries
            .iter()
            .map(|(key, tot)| (key.to_string(), [("tot", *tot)].into_iter().collect()))
            .collect()
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_share_of_total() {
        let stats = stats_map(&[("A", 10.0), ("B", 30.0), ("C", 0.0)]);
        let result = aggregate(&keys(&["A", "B", "C"]), &stats, &QueueList::new(), StatField::Total);

        assert_eq!(result.total, 40.0);
        assert_eq!(result.series.len(), 3);
        assert_eq!(result.series[0].label, "A");
        assert!((result.series[0].data[0] - 25.0).abs() < 1e-9);
        assert!((result.series[1].data[0] - 75.0).abs() < 1e-9);
        assert_eq!(result.series[2].data[0], 0.0);
        assert_eq!(result.series[1].original_data, vec![30.0]);
    }

    #[test]
    fn test_zero_total_yields_zero_percentages() {
        let stats = stats_map(&[("A", 0.0), ("B", 0.0)]);
        let result = aggregate(&keys(&["A", "B"]), &stats, &QueueList::new(), StatField::Total);

        assert_eq!(result.total, 0.0);
        for series in &result.series {
            assert_eq!(series.data, vec![0.0]);
            assert!(!series.data[0].is_nan());
        }
    }

    #[test]
    fn test_percentages_sum_to_hundred() {
        let stats = stats_map(&[("1", 7.0), ("2", 13.0), ("3", 1.0), ("4", 29.0), ("5", 3.0)]);
        let selected = keys(&["1", "2", "3", "4", "5"]);
        let result = aggregate(&selected, &stats, &QueueList::new(), StatField::Total);

        let sum: f64 = result.series.iter().map(|s| s.data[0]).sum();
        assert!((sum - 100.0).abs() < 1e-6 * selected.len() as f64);
        assert!(result.series.iter().all(|s| (0.0..=100.0).contains(&s.data[0])));
    }

    #[test]
    fn test_missing_field_reads_as_zero() {
        let mut stats = BTreeMap::new();
        stats.insert("A".to_string(), QueueStats::from_value(json!({"tot": 5})));
        stats.insert("B".to_string(), QueueStats::from_value(json!({"tot_failed": "x"})));

        let result = aggregate(&keys(&["A", "B"]), &stats, &QueueList::new(), StatField::Failed);
        assert_eq!(result.total, 0.0);
        assert_eq!(result.series.len(), 2);
        assert!(result.series.iter().all(|s| s.data == vec![0.0]));
    }

    #[test]
    fn test_absent_queues_skipped_and_order_kept() {
        let stats = stats_map(&[("A", 1.0), ("B", 3.0)]);
        let result = aggregate(&keys(&["B", "Z", "A"]), &stats, &QueueList::new(), StatField::Total);

        let labels: Vec<&str> = result.series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["B", "A"]);
        assert_eq!(result.total, 4.0);
    }

    #[test]
    fn test_summarize_fills_every_family() {
        let mut stats = BTreeMap::new();
        stats.insert(
            "401".to_string(),
            QueueStats::from_value(json!({
                "tot": 20, "tot_failed": 4, "tot_null": 1,
                "processed_less_sla": 12, "avg_recall_time": 90
            })),
        );

        let summary = summarize(&keys(&["401"]), &stats, &QueueList::new());
        assert_eq!(summary.total_calls.total, 20.0);
        assert_eq!(summary.calls_before_sla.field, StatField::ProcessedLessSla);
        assert_eq!(summary.calls_before_sla.total, 12.0);
        assert_eq!(summary.failed_calls.total, 4.0);
        assert_eq!(summary.callback_time.total, 90.0);
        assert_eq!(summary.invalid_calls.total, 1.0);
        assert_eq!(summary.failed_calls.series[0].data, vec![100.0]);
    }
}
