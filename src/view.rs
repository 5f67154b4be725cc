//! Read-only views handed to clients

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dashboard::Dashboard;
use crate::models::{Metric, Status};
use crate::status::{self, HistoryBarSegment};

/// JSON view of a dashboard
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub dashboard_id: String,
    /// False when nothing was ever written under this id
    pub exists: bool,
    pub base_url: String,
    pub metrics: Vec<MetricView>,
}

/// A metric with its derived status, as displayed
#[derive(Debug, Clone, Serialize)]
pub struct MetricView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub detail_url: String,
    /// Status after staleness and the deviation test
    pub status: Status,
    /// Status as last reported by the producer
    pub reported_status: Status,
    pub value: f64,
    pub median: f64,
    pub mad_multiplier: f64,
    pub stale: bool,
    pub hide_mad: bool,
    pub hide_value: bool,
    pub expires: u64,
    pub freshness: u64,
    pub last_update: Option<DateTime<Utc>>,
    pub last_ok: Option<DateTime<Utc>>,
    pub pct_ok: f64,
    pub pct_warning: f64,
    pub pct_critical: f64,
    pub pct_unknown: f64,
    pub history_bar: Vec<HistoryBarSegment>,
}

impl MetricView {
    pub fn new(metric: &Metric, now: DateTime<Utc>) -> Self {
        Self {
            id: metric.id.clone(),
            title: metric.title.clone(),
            description: metric.description.clone(),
            detail_url: metric.detail_url.clone(),
            status: status::preferred_status(metric, now),
            reported_status: metric.status,
            value: metric.value,
            median: status::history_median(metric),
            mad_multiplier: status::mad_multiplier(metric),
            stale: status::is_stale(metric, now),
            hide_mad: metric.hide_deviation,
            hide_value: metric.hide_value,
            expires: metric.expires,
            freshness: metric.freshness,
            last_update: metric.summary.last_update,
            last_ok: metric.summary.last_ok,
            pct_ok: metric.summary.pct_ok,
            pct_warning: metric.summary.pct_warning,
            pct_critical: metric.summary.pct_critical,
            pct_unknown: metric.summary.pct_unknown,
            history_bar: status::history_bar(metric),
        }
    }
}

impl DashboardView {
    pub fn new(dashboard: &Dashboard, base_url: &str, now: DateTime<Utc>) -> Self {
        Self {
            dashboard_id: dashboard.id.clone(),
            exists: true,
            base_url: base_url.to_string(),
            metrics: dashboard
                .visible_metrics(now)
                .into_iter()
                .map(|metric| MetricView::new(metric, now))
                .collect(),
        }
    }

    pub fn empty(dashboard_id: &str, base_url: &str) -> Self {
        Self {
            dashboard_id: dashboard_id.to_string(),
            exists: false,
            base_url: base_url.to_string(),
            metrics: Vec::new(),
        }
    }
}
