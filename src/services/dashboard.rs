//! Dashboard load / mutate / persist cycle on top of the storage layer

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dashboard::Dashboard;
use crate::error::{AppError, Result};
use crate::models::{MetricUpdate, ValidationError};
use crate::storage::{Storage, StorageError};
use crate::view::DashboardView;

const MAX_DASHBOARD_ID_LEN: usize = 128;
const MAX_METRIC_ID_LEN: usize = 256;
const PROPOSED_ID_LEN: usize = 20;

/// Ids taken by fixed routes
pub const RESERVED_DASHBOARD_IDS: [&str; 3] = ["health", "metrics", "create"];

/// Result of a successful metric update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutOutcome {
    pub dashboard_created: bool,
    pub metric_created: bool,
}

/// Dashboard operations; every mutation runs under the dashboard's
/// exclusive storage lock from load to persist.
#[derive(Clone)]
pub struct DashboardService {
    storage: Arc<Storage>,
    base_url: String,
}

impl DashboardService {
    pub fn new(storage: Arc<Storage>, base_url: impl Into<String>) -> Self {
        Self {
            storage,
            base_url: base_url.into(),
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Load a dashboard by id
    pub async fn load(&self, dashboard_id: &str) -> Result<Dashboard> {
        validate_dashboard_id(dashboard_id)?;
        let handle = self.storage.read(dashboard_id).await;
        let data = handle.get().await?;
        Dashboard::decode(dashboard_id, &data)
    }

    /// Read view with expired metrics filtered out. An unknown id yields an
    /// empty view rather than an error.
    pub async fn view(&self, dashboard_id: &str, now: DateTime<Utc>) -> Result<DashboardView> {
        match self.load(dashboard_id).await {
            Ok(dashboard) => Ok(DashboardView::new(&dashboard, &self.base_url, now)),
            Err(AppError::NotFound(_)) => Ok(DashboardView::empty(dashboard_id, &self.base_url)),
            Err(e) => Err(e),
        }
    }

    /// Create or update one metric, creating the dashboard on first write.
    pub async fn put_metric(
        &self,
        dashboard_id: &str,
        metric_id: &str,
        update: &MetricUpdate,
        credential: &str,
        now: DateTime<Utc>,
    ) -> Result<PutOutcome> {
        validate_dashboard_id(dashboard_id)?;
        validate_metric_id(metric_id)?;

        let handle = self.storage.write(dashboard_id).await;
        let (mut dashboard, dashboard_created) = match handle.get().await {
            Ok(data) => (Dashboard::decode(dashboard_id, &data)?, false),
            Err(StorageError::NotFound(_)) => (Dashboard::create(dashboard_id, credential)?, true),
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = dashboard.authorize(credential) {
            warn!(
                dashboard_id = %dashboard_id,
                metric_id = %metric_id,
                "Rejected metric update with wrong access key"
            );
            return Err(e);
        }

        let metric_created = dashboard.upsert_metric(metric_id, update, now)?;
        handle.put(Bytes::from(dashboard.encode()?)).await?;

        if dashboard_created {
            info!(dashboard_id = %dashboard_id, "Dashboard created");
        }
        debug!(
            dashboard_id = %dashboard_id,
            metric_id = %metric_id,
            metric_created = metric_created,
            "Metric updated"
        );

        Ok(PutOutcome {
            dashboard_created,
            metric_created,
        })
    }

    /// Run the credential check `put_metric` would run, without writing.
    /// An unknown dashboard only requires a credential long enough to create it.
    pub async fn check_credential(&self, dashboard_id: &str, credential: &str) -> Result<()> {
        validate_dashboard_id(dashboard_id)?;

        let handle = self.storage.read(dashboard_id).await;
        match handle.get().await {
            Ok(data) => Dashboard::decode(dashboard_id, &data)?.authorize(credential),
            Err(StorageError::NotFound(_)) => {
                Dashboard::create(dashboard_id, credential).map(|_| ())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove one metric from an existing dashboard
    pub async fn delete_metric(
        &self,
        dashboard_id: &str,
        metric_id: &str,
        credential: &str,
    ) -> Result<()> {
        validate_dashboard_id(dashboard_id)?;

        let handle = self.storage.write(dashboard_id).await;
        let mut dashboard = Dashboard::decode(dashboard_id, &handle.get().await?)?;
        dashboard.authorize(credential)?;

        if dashboard.remove_metric(metric_id).is_none() {
            return Err(AppError::NotFound(format!("metric '{}'", metric_id)));
        }
        handle.put(Bytes::from(dashboard.encode()?)).await?;

        info!(dashboard_id = %dashboard_id, metric_id = %metric_id, "Metric deleted");
        Ok(())
    }

    /// Remove the dashboard document entirely
    pub async fn delete_dashboard(&self, dashboard_id: &str, credential: &str) -> Result<()> {
        validate_dashboard_id(dashboard_id)?;

        let handle = self.storage.write(dashboard_id).await;
        let dashboard = Dashboard::decode(dashboard_id, &handle.get().await?)?;
        dashboard.authorize(credential)?;
        handle.delete().await?;

        info!(dashboard_id = %dashboard_id, "Dashboard deleted");
        Ok(())
    }

    /// Propose a random dashboard id that is not in use yet
    pub async fn propose_id(&self) -> Result<String> {
        loop {
            let mut candidate = Uuid::new_v4().simple().to_string();
            candidate.truncate(PROPOSED_ID_LEN);
            if !self.storage.read(&candidate).await.exists().await? {
                return Ok(candidate);
            }
        }
    }
}

/// Dashboard ids double as file names and object keys
pub fn validate_dashboard_id(id: &str) -> std::result::Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_DASHBOARD_ID_LEN {
        return Err(ValidationError::new(
            "dashboard_id",
            format!("must be 1 to {} characters", MAX_DASHBOARD_ID_LEN),
        ));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::new(
            "dashboard_id",
            "may only contain letters, digits, '-' and '_'",
        ));
    }
    if RESERVED_DASHBOARD_IDS.contains(&id) {
        return Err(ValidationError::new("dashboard_id", format!("'{}' is reserved", id)));
    }
    Ok(())
}

pub fn validate_metric_id(id: &str) -> std::result::Result<(), ValidationError> {
    if id.is_empty() || id.chars().count() > MAX_METRIC_ID_LEN {
        return Err(ValidationError::new(
            "metric_id",
            format!("must be 1 to {} characters", MAX_METRIC_ID_LEN),
        ));
    }
    Ok(())
}
