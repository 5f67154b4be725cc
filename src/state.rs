//! Application state shared across handlers

use crate::routes::metrics::Metrics;
use crate::services::dashboard::DashboardService;
use crate::storage::Storage;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Dashboard load / update / delete operations
    pub dashboards: DashboardService,
    /// Application metrics for Prometheus
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Create new application state
    ///
    /// # Arguments
    /// * `storage` - Storage backend with its lock registry
    /// * `base_url` - Public URL the service is reachable at
    pub fn new(storage: Arc<Storage>, base_url: impl Into<String>) -> Self {
        Self {
            dashboards: DashboardService::new(storage, base_url),
            metrics: Arc::new(Metrics::new()),
        }
    }
}
