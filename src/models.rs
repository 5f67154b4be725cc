//! Core domain models for MonDash

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest retention / freshness window a metric may request (one week).
pub const MAX_WINDOW_SECS: i64 = 604_800;
/// Retention window applied to metrics that never supplied one.
pub const DEFAULT_EXPIRES_SECS: u64 = 604_800;
/// Staleness threshold applied to metrics that never supplied one.
pub const DEFAULT_FRESHNESS_SECS: u64 = 3_600;
pub const MAX_TITLE_CHARS: usize = 512;
pub const MAX_DESCRIPTION_CHARS: usize = 1_024;

/// Health status of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    Warning,
    Critical,
    #[default]
    Unknown,
}

impl Status {
    pub const ALL: [Status; 4] = [Status::Ok, Status::Warning, Status::Critical, Status::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "Warning",
            Status::Critical => "Critical",
            Status::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("'{}' is not one of OK, Warning, Critical, Unknown", s))
    }
}

/// A rejected metric update, naming the offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A single observation in a metric's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: DateTime<Utc>,
    pub status: Status,
    pub value: f64,
}

/// Values derived from the surviving history on every update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricSummary {
    pub last_update: Option<DateTime<Utc>>,
    pub last_ok: Option<DateTime<Utc>>,
    pub pct_ok: f64,
    pub pct_warning: f64,
    pub pct_critical: f64,
    pub pct_unknown: f64,
}

/// One named time series on a dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub detail_url: String,
    /// Last reported status
    #[serde(default)]
    pub status: Status,
    /// Last reported value
    #[serde(default)]
    pub value: f64,
    #[serde(default = "default_expires")]
    pub expires: u64,
    #[serde(default = "default_freshness")]
    pub freshness: u64,
    #[serde(default, rename = "ignore_mad")]
    pub ignore_statistical_status: bool,
    #[serde(default, rename = "hide_mad")]
    pub hide_deviation: bool,
    #[serde(default)]
    pub hide_value: bool,
    #[serde(default)]
    pub staleness_status: Option<Status>,
    #[serde(default)]
    pub history: Vec<Sample>,
    #[serde(default)]
    pub summary: MetricSummary,
}

fn default_expires() -> u64 {
    DEFAULT_EXPIRES_SECS
}

fn default_freshness() -> u64 {
    DEFAULT_FRESHNESS_SECS
}

impl Metric {
    /// Create an empty metric with default windows
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            detail_url: String::new(),
            status: Status::Unknown,
            value: 0.0,
            expires: DEFAULT_EXPIRES_SECS,
            freshness: DEFAULT_FRESHNESS_SECS,
            ignore_statistical_status: false,
            hide_deviation: false,
            hide_value: false,
            staleness_status: None,
            history: Vec::new(),
            summary: MetricSummary::default(),
        }
    }

    /// Apply a validated update at `now`.
    ///
    /// Appends one sample, prunes the history to the retention window and
    /// recomputes the summary from what survives.
    pub fn apply(&mut self, update: &ValidUpdate, now: DateTime<Utc>) {
        self.title = update.title.clone();
        self.description = update.description.clone();
        self.status = update.status;
        self.value = update.value;
        self.ignore_statistical_status = update.ignore_statistical_status;
        self.hide_deviation = update.hide_deviation;
        self.hide_value = update.hide_value;
        self.staleness_status = update.staleness_status;

        if !update.detail_url.is_empty() {
            self.detail_url = update.detail_url.clone();
        }
        if let Some(expires) = update.expires {
            self.expires = expires;
        }
        if let Some(freshness) = update.freshness {
            self.freshness = freshness;
        }

        self.history.push(Sample {
            time: now,
            status: update.status,
            value: update.value,
        });

        let cutoff = now - Duration::seconds(self.expires as i64);
        self.history.retain(|sample| sample.time > cutoff);

        self.recompute_summary();
        self.summary.last_update = Some(now);
    }

    fn recompute_summary(&mut self) {
        let mut counts = [0usize; 4];
        let mut last_ok = None;

        for sample in &self.history {
            let slot = match sample.status {
                Status::Ok => 0,
                Status::Warning => 1,
                Status::Critical => 2,
                Status::Unknown => 3,
            };
            counts[slot] += 1;
            if sample.status == Status::Ok && last_ok.map_or(true, |t| sample.time > t) {
                last_ok = Some(sample.time);
            }
        }

        let total = self.history.len();
        let pct = |count: usize| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            }
        };

        self.summary.last_ok = last_ok;
        self.summary.pct_ok = pct(counts[0]);
        self.summary.pct_warning = pct(counts[1]);
        self.summary.pct_critical = pct(counts[2]);
        self.summary.pct_unknown = pct(counts[3]);
    }

    /// Whether the metric has outlived its retention window without an update
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.summary.last_update {
            Some(last) => last + Duration::seconds(self.expires as i64) < now,
            None => true,
        }
    }
}

/// Request payload for upserting a metric
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricUpdate {
    pub title: String,
    pub description: String,
    pub detail_url: String,
    pub status: String,
    pub value: f64,
    pub expires: i64,
    pub freshness: i64,
    pub ignore_mad: bool,
    pub hide_mad: bool,
    pub hide_value: bool,
    pub staleness_status: Option<String>,
}

/// A metric update that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidUpdate {
    pub title: String,
    pub description: String,
    pub detail_url: String,
    pub status: Status,
    pub value: f64,
    pub expires: Option<u64>,
    pub freshness: Option<u64>,
    pub ignore_statistical_status: bool,
    pub hide_deviation: bool,
    pub hide_value: bool,
    pub staleness_status: Option<Status>,
}

impl MetricUpdate {
    pub const FIELDS: [&'static str; 11] = [
        "title",
        "description",
        "detail_url",
        "status",
        "value",
        "expires",
        "freshness",
        "ignore_mad",
        "hide_mad",
        "hide_value",
        "staleness_status",
    ];

    /// Validation error for a body that did not deserialize. `detail` is the
    /// decoder message, which names the failing field as `<field>: <reason>`.
    pub fn body_error(detail: &str) -> ValidationError {
        let field = detail
            .split(": ")
            .find_map(|part| Self::FIELDS.into_iter().find(|field| *field == part))
            .unwrap_or("body");
        ValidationError::new(field, detail)
    }

    /// Validate the update as a whole; nothing is applied on failure.
    pub fn validate(&self) -> Result<ValidUpdate, ValidationError> {
        let status = self
            .status
            .parse::<Status>()
            .map_err(|reason| ValidationError::new("status", reason))?;

        let expires = window("expires", self.expires)?;
        let freshness = window("freshness", self.freshness)?;

        if self.title.chars().count() > MAX_TITLE_CHARS {
            return Err(ValidationError::new(
                "title",
                format!("longer than {} characters", MAX_TITLE_CHARS),
            ));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ValidationError::new(
                "description",
                format!("longer than {} characters", MAX_DESCRIPTION_CHARS),
            ));
        }

        let staleness_status = match self.staleness_status.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<Status>()
                    .map_err(|reason| ValidationError::new("staleness_status", reason))?,
            ),
        };

        Ok(ValidUpdate {
            title: self.title.clone(),
            description: self.description.clone(),
            detail_url: self.detail_url.clone(),
            status,
            value: self.value,
            expires,
            freshness,
            ignore_statistical_status: self.ignore_mad,
            hide_deviation: self.hide_mad,
            hide_value: self.hide_value,
            staleness_status,
        })
    }
}

/// Zero keeps the stored window, anything else must lie within one week.
fn window(field: &'static str, secs: i64) -> Result<Option<u64>, ValidationError> {
    if !(0..=MAX_WINDOW_SECS).contains(&secs) {
        return Err(ValidationError::new(
            field,
            format!("{} not in range 0 <= x <= {}", secs, MAX_WINDOW_SECS),
        ));
    }
    Ok((secs > 0).then_some(secs as u64))
}
