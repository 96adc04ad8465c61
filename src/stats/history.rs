//! Time-of-day bucketing of per-queue call history.
//!
//! Produces the line series (total and failed calls per queue) and the
//! stacked answered/failed/invalid series summed across queues, all
//! limited to samples taken after the dashboard start.

use super::aggregator::percentage;
use super::models::{display_name, HistoryPoint, QueueHistory, QueueList};

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// A history sample tagged with its queue's display name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedPoint {
    #[serde(flatten)]
    pub point: HistoryPoint,
    pub name: String,
}

/// Stacked series of one queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStack {
    pub queue: String,
    pub name: String,
    pub answered: Vec<NamedPoint>,
    pub failed: Vec<NamedPoint>,
    pub total: Vec<NamedPoint>,
}

/// One line of a line chart.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub topic: String,
    pub topic_name: String,
    pub dates: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StackCategory {
    Answered,
    Failed,
    Invalid,
}

/// One category of one time-of-day bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRecord {
    pub time: String,
    pub full_date: DateTime<Utc>,
    pub category: StackCategory,
    pub views: f64,
    pub value_label: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySeries {
    pub stacked: Vec<QueueStack>,
    pub line_total: Vec<Topic>,
    pub line_failed: Vec<Topic>,
    pub buckets: Vec<BucketRecord>,
}

#[derive(Debug, Clone)]
struct Bucket {
    time: String,
    full_date: DateTime<Utc>,
    answered: f64,
    failed: f64,
    invalid: f64,
}

/// Time-of-day key of a sample: zero-padded hour, then `00` on the hour
/// or the unpadded minute otherwise.
pub fn bucket_key(ts: DateTime<Utc>) -> String {
    match ts.minute() {
        0 => format!("{:02}:00", ts.hour()),
        m => format!("{:02}:{}", ts.hour(), m),
    }
}

fn after(points: &[HistoryPoint], start: DateTime<Utc>) -> Vec<HistoryPoint> {
    points
        .iter()
        .filter(|p| p.full_date > start)
        .cloned()
        .collect()
}

fn named_after(points: &[HistoryPoint], start: DateTime<Utc>, name: &str) -> Vec<NamedPoint> {
    points
        .iter()
        .filter(|p| p.full_date > start)
        .map(|p| NamedPoint {
            point: p.clone(),
            name: name.to_string(),
        })
        .collect()
}

fn value_at(points: &[HistoryPoint], i: usize) -> f64 {
    points.get(i).map(|p| p.value).unwrap_or(0.0)
}

/// Build every history series for the selected queues.
///
/// Queues without history are skipped; missing metric arrays are treated
/// as empty.
pub fn aggregate_history(
    selected: &[String],
    histories: &BTreeMap<String, QueueHistory>,
    queues: &QueueList,
    dashboard_start: DateTime<Utc>,
) -> HistorySeries {
    let mut out = HistorySeries::default();
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for key in selected {
        let Some(history) = histories.get(key) else {
            continue;
        };
        let name = display_name(queues, key);

        out.stacked.push(QueueStack {
            queue: key.clone(),
            name: name.clone(),
            answered: named_after(&history.answered, dashboard_start, &name),
            failed: named_after(&history.failed, dashboard_start, &name),
            total: named_after(&history.total, dashboard_start, &name),
        });

        out.line_total.push(Topic {
            topic: key.clone(),
            topic_name: name.clone(),
            dates: after(&history.total, dashboard_start),
        });
        out.line_failed.push(Topic {
            topic: key.clone(),
            topic_name: name,
            dates: after(&history.failed, dashboard_start),
        });

        for (i, sample) in history.total.iter().enumerate() {
            if sample.full_date <= dashboard_start {
                continue;
            }

            let time = bucket_key(sample.full_date);
            let slot = *index.entry(time.clone()).or_insert_with(|| {
                buckets.push(Bucket {
                    time,
                    full_date: sample.full_date,
                    answered: 0.0,
                    failed: 0.0,
                    invalid: 0.0,
                });
                buckets.len() - 1
            });

            let bucket = &mut buckets[slot];
            bucket.full_date = bucket.full_date.min(sample.full_date);
            bucket.answered += value_at(&history.answered, i);
            bucket.failed += value_at(&history.failed, i);
            bucket.invalid += value_at(&history.invalid, i);
        }
    }

    buckets.sort_by_key(|b| b.full_date);

    for bucket in buckets.into_iter().filter(|b| b.full_date > dashboard_start) {
        let sum = bucket.answered + bucket.failed + bucket.invalid;
        for (category, views) in [
            (StackCategory::Answered, bucket.answered),
            (StackCategory::Failed, bucket.failed),
            (StackCategory::Invalid, bucket.invalid),
        ] {
            out.buckets.push(BucketRecord {
                time: bucket.time.clone(),
                full_date: bucket.full_date,
                category,
                views,
                value_label: percentage(views, sum),
            });
        }
    }

    tracing::debug!(
        "History: {} queues, {} bucket records after {}",
        out.stacked.len(),
        out.buckets.len(),
        dashboard_start.format("%Y-%m-%d %H:%M")
    );

    out
}
