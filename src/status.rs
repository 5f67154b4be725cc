//! Status derivation from a metric's history
//!
//! Everything here is pure: callers pass the metric and the current time and
//! get back the derived status, median or history bar. The outlier test is a
//! median absolute deviation multiplier with fixed thresholds.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::{Metric, Status};

/// Multiplier above which the current value is reported as Warning
pub const WARNING_MULTIPLIER: f64 = 3.0;
/// Multiplier above which the current value is reported as Critical
pub const CRITICAL_MULTIPLIER: f64 = 4.0;

/// Median of a non-empty series.
///
/// Even-length series average the two middle elements.
pub fn median(values: &[f64]) -> f64 {
    debug_assert!(!values.is_empty(), "median of an empty series");
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * sorted[mid - 1] + 0.5 * sorted[mid]
    } else {
        sorted[mid]
    }
}

/// Median of the absolute deviations from the median.
pub fn median_absolute_deviation(values: &[f64]) -> f64 {
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

fn history_values(metric: &Metric) -> Vec<f64> {
    metric.history.iter().map(|sample| sample.value).collect()
}

/// Median of the metric's history, or its current value when there is none.
pub fn history_median(metric: &Metric) -> f64 {
    let values = history_values(metric);
    if values.is_empty() {
        return metric.value;
    }
    median(&values)
}

/// How many median absolute deviations the current value sits from the
/// history median.
///
/// A series without spread counts as one unit of spread, so the result is
/// exactly 1 when the value matches the constant and grows with the distance
/// otherwise.
pub fn mad_multiplier(metric: &Metric) -> f64 {
    let values = history_values(metric);
    if values.is_empty() {
        return 1.0;
    }

    let deviation = (metric.value - median(&values)).abs();
    let mad = median_absolute_deviation(&values);
    if mad == 0.0 {
        return deviation.max(1.0);
    }
    deviation / mad
}

pub fn statistical_status(metric: &Metric) -> Status {
    let multiplier = mad_multiplier(metric);
    if multiplier > CRITICAL_MULTIPLIER {
        Status::Critical
    } else if multiplier > WARNING_MULTIPLIER {
        Status::Warning
    } else {
        Status::Ok
    }
}

/// Whether no update arrived within the freshness window.
pub fn is_stale(metric: &Metric, now: DateTime<Utc>) -> bool {
    match metric.summary.last_update {
        Some(last) => now > last + Duration::seconds(metric.freshness as i64),
        None => true,
    }
}

/// Status to display: staleness overrides, then the reported or the
/// statistical status depending on `ignore_mad`.
pub fn preferred_status(metric: &Metric, now: DateTime<Utc>) -> Status {
    if is_stale(metric, now) {
        return metric.staleness_status.unwrap_or(Status::Unknown);
    }
    if metric.ignore_statistical_status {
        return metric.status;
    }
    statistical_status(metric)
}

/// A run of consecutive samples sharing one status
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryBarSegment {
    pub status: Status,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_secs: i64,
    /// Share of all samples that fall into this segment
    pub fraction: f64,
}

/// Run-length encode the history by status, oldest first.
///
/// A segment ends where the next one starts; the last segment ends at its own
/// newest sample.
pub fn history_bar(metric: &Metric) -> Vec<HistoryBarSegment> {
    let total = metric.history.len();
    let mut segments: Vec<HistoryBarSegment> = Vec::new();
    let mut run_len = 0usize;

    for sample in &metric.history {
        if let Some(current) = segments.last_mut() {
            current.end = sample.time;
            if current.status == sample.status {
                run_len += 1;
                continue;
            }
            current.fraction = run_len as f64 / total as f64;
        }

        segments.push(HistoryBarSegment {
            status: sample.status,
            start: sample.time,
            end: sample.time,
            duration_secs: 0,
            fraction: 0.0,
        });
        run_len = 1;
    }

    if let Some(last) = segments.last_mut() {
        last.fraction = run_len as f64 / total as f64;
    }
    for segment in &mut segments {
        segment.duration_secs = (segment.end - segment.start).num_seconds();
    }

    segments
}
