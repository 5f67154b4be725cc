//! Dashboard aggregate: the persisted document holding all metrics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{AppError, Result};
use crate::models::{Metric, MetricUpdate, Status};

/// Shortest credential accepted when a dashboard is created
pub const MIN_ACCESS_KEY_LEN: usize = 10;

/// A named collection of metrics guarded by one shared access key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    #[serde(skip)]
    pub id: String,
    pub access_key: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, Metric>,
}

impl Dashboard {
    /// Start a dashboard on its first write, binding `credential` as the key.
    pub fn create(id: &str, credential: &str) -> Result<Self> {
        if credential.len() < MIN_ACCESS_KEY_LEN {
            return Err(AppError::Unauthorized(format!(
                "access key must be at least {} characters",
                MIN_ACCESS_KEY_LEN
            )));
        }
        Ok(Self {
            id: id.to_string(),
            access_key: credential.to_string(),
            metrics: BTreeMap::new(),
        })
    }

    pub fn authorize(&self, credential: &str) -> Result<()> {
        if self.access_key.as_bytes() != credential.as_bytes() {
            return Err(AppError::Unauthorized("access key did not match".into()));
        }
        Ok(())
    }

    /// Validate `update` and apply it to the metric, creating the metric if
    /// needed. Nothing changes when validation fails.
    ///
    /// Returns whether the metric was newly created.
    pub fn upsert_metric(
        &mut self,
        metric_id: &str,
        update: &MetricUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let valid = update.validate()?;
        let created = !self.metrics.contains_key(metric_id);
        self.metrics
            .entry(metric_id.to_string())
            .or_insert_with(|| Metric::new(metric_id))
            .apply(&valid, now);
        Ok(created)
    }

    pub fn remove_metric(&mut self, metric_id: &str) -> Option<Metric> {
        self.metrics.remove(metric_id)
    }

    /// Metrics still within their retention window, newest update first.
    pub fn visible_metrics(&self, now: DateTime<Utc>) -> Vec<&Metric> {
        let mut visible: Vec<&Metric> = self
            .metrics
            .values()
            .filter(|metric| !metric.is_expired(now))
            .collect();
        visible.sort_by(|a, b| {
            b.summary
                .last_update
                .cmp(&a.summary.last_update)
                .then_with(|| a.id.cmp(&b.id))
        });
        visible
    }

    /// Decode a stored document, migrating legacy field names first.
    pub fn decode(id: &str, data: &[u8]) -> Result<Self> {
        let corrupt = |e: serde_json::Error| AppError::Corrupt(format!("{}: {}", id, e));

        let mut raw: Value = serde_json::from_slice(data).map_err(corrupt)?;
        migrate_legacy_fields(&mut raw);

        let mut dashboard: Dashboard = serde_json::from_value(raw).map_err(corrupt)?;
        dashboard.id = id.to_string();

        for metric in dashboard.metrics.values_mut() {
            // Legacy documents stored history newest first
            metric.history.sort_by_key(|sample| sample.time);
        }
        Ok(dashboard)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| AppError::InternalError(e.to_string()))
    }
}

const GO_ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// Spelling of `Unknown` written by older producers
const LEGACY_UNKNOWN: &str = "Unknowm";

const LEGACY_SUMMARY_FIELDS: [(&str, &str); 5] = [
    ("LastUpdate", "last_update"),
    ("LastOK", "last_ok"),
    ("PercOK", "pct_ok"),
    ("PercWarn", "pct_warning"),
    ("PercCrit", "pct_critical"),
];

/// Rewrite deprecated field names in a raw dashboard document.
///
/// Values are copied to the current name before the deprecated key is
/// removed; a current key that already exists wins. Running this on an
/// already migrated document changes nothing.
pub fn migrate_legacy_fields(doc: &mut Value) {
    let Some(root) = doc.as_object_mut() else {
        return;
    };

    rename_key(root, "api_key", "access_key");

    let keyed = match root.get("metrics") {
        Some(Value::Array(list)) => Some(
            list.iter()
                .filter_map(|metric| {
                    let id = metric.get("id")?.as_str()?.to_string();
                    Some((id, metric.clone()))
                })
                .collect::<Map<String, Value>>(),
        ),
        _ => None,
    };
    if let Some(keyed) = keyed {
        root.insert("metrics".into(), Value::Object(keyed));
    }

    if let Some(Value::Object(metrics)) = root.get_mut("metrics") {
        for metric in metrics.values_mut().filter_map(Value::as_object_mut) {
            migrate_metric(metric);
        }
    }
}

fn migrate_metric(metric: &mut Map<String, Value>) {
    // Older producers sent an empty string for "no staleness override"
    if metric.get("staleness_status").and_then(Value::as_str) == Some("") {
        metric.insert("staleness_status".into(), Value::Null);
    }

    for field in ["status", "staleness_status"] {
        if let Some(value) = metric.get_mut(field) {
            migrate_status(value);
        }
    }
    if let Some(Value::Array(history)) = metric.get_mut("history") {
        for sample in history.iter_mut() {
            if let Some(value) = sample.get_mut("status") {
                migrate_status(value);
            }
        }
    }

    let Some(Value::Object(meta)) = metric.remove("meta") else {
        return;
    };

    let summary = metric
        .entry("summary")
        .or_insert_with(|| Value::Object(Map::new()));
    let Some(summary) = summary.as_object_mut() else {
        return;
    };

    for (legacy, current) in LEGACY_SUMMARY_FIELDS {
        let Some(value) = meta.get(legacy) else {
            continue;
        };
        let value = match value.as_str() {
            Some(GO_ZERO_TIME) => Value::Null,
            _ => value.clone(),
        };
        summary.entry(current).or_insert(value);
    }
}

fn migrate_status(value: &mut Value) {
    if value.as_str() == Some(LEGACY_UNKNOWN) {
        *value = Value::String(Status::Unknown.to_string());
    }
}

fn rename_key(obj: &mut Map<String, Value>, legacy: &str, current: &str) {
    if let Some(value) = obj.remove(legacy) {
        obj.entry(current).or_insert(value);
    }
}
