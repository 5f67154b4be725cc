//! Prometheus metrics endpoint

use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AppError;
use crate::state::AppState;

/// Process counters for Prometheus
#[derive(Default)]
pub struct Metrics {
    /// Metric updates persisted
    updates_total: AtomicU64,
    /// Requests rejected for a bad credential or invalid data
    rejected_total: AtomicU64,
    /// Metrics and dashboards deleted
    deletes_total: AtomicU64,
    /// Requests that failed in the storage backend
    storage_failures_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_updates(&self) {
        self.updates_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_deletes(&self) {
        self.deletes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed request by its cause
    pub fn record_error(&self, err: &AppError) {
        match err {
            AppError::Unauthorized(_) | AppError::Validation(_) => {
                self.rejected_total.fetch_add(1, Ordering::Relaxed);
            }
            AppError::Storage(_) | AppError::Corrupt(_) => {
                self.storage_failures_total.fetch_add(1, Ordering::Relaxed);
            }
            AppError::NotFound(_) | AppError::InternalError(_) => {}
        }
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            updates_total: self.updates_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            deletes_total: self.deletes_total.load(Ordering::Relaxed),
            storage_failures_total: self.storage_failures_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub updates_total: u64,
    pub rejected_total: u64,
    pub deletes_total: u64,
    pub storage_failures_total: u64,
}

/// GET /metrics
///
/// Returns Prometheus-format metrics
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_metrics();
    let tracked_locks = state.dashboards.storage().locks().len();

    let output = format!(
        r#"# HELP mondash_metric_updates_total Total number of metric updates persisted
# TYPE mondash_metric_updates_total counter
mondash_metric_updates_total {}

# HELP mondash_rejected_requests_total Requests rejected for a bad access key or invalid data
# TYPE mondash_rejected_requests_total counter
mondash_rejected_requests_total {}

# HELP mondash_deletes_total Total number of metrics and dashboards deleted
# TYPE mondash_deletes_total counter
mondash_deletes_total {}

# HELP mondash_storage_failures_total Requests that failed in the storage backend
# TYPE mondash_storage_failures_total counter
mondash_storage_failures_total {}

# HELP mondash_dashboard_locks Dashboard locks currently tracked
# TYPE mondash_dashboard_locks gauge
mondash_dashboard_locks {}

# HELP mondash_info Build information
# TYPE mondash_info gauge
mondash_info{{version="{}"}} 1
"#,
        snapshot.updates_total,
        snapshot.rejected_total,
        snapshot.deletes_total,
        snapshot.storage_failures_total,
        tracked_locks,
        env!("CARGO_PKG_VERSION"),
    );

    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationError;
    use crate::storage::StorageError;

    #[test]
    fn test_record_error_by_cause() {
        let metrics = Metrics::new();
        metrics.record_error(&AppError::Unauthorized("no".into()));
        metrics.record_error(&AppError::from(ValidationError::new("status", "bad")));
        metrics.record_error(&AppError::Storage(StorageError::InvalidUri("x".into())));
        metrics.record_error(&AppError::NotFound("d1".into()));
        metrics.inc_updates();

        assert_eq!(
            metrics.get_metrics(),
            MetricsSnapshot {
                updates_total: 1,
                rejected_total: 2,
                deletes_total: 0,
                storage_failures_total: 1,
            }
        );
    }
}
