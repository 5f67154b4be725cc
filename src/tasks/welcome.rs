//! Welcome task - keeps the public demo dashboard alive

use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use tracing::{error, info};

use crate::models::{MetricUpdate, Status};
use crate::services::dashboard::DashboardService;

pub const WELCOME_DASHBOARD: &str = "welcome";
pub const WELCOME_METRIC: &str = "beer_available";

/// Demo metric for a given number of bottles
pub fn beer_update(bottles: u32) -> MetricUpdate {
    let status = match bottles {
        0..=5 => Status::Critical,
        6..=11 => Status::Warning,
        _ => Status::Ok,
    };

    MetricUpdate {
        title: "Amount of beer in the fridge".to_string(),
        description: format!("Currently there are {} bottles of beer in the fridge", bottles),
        status: status.to_string(),
        value: f64::from(bottles),
        expires: 86_400,
        freshness: 120,
        ..Default::default()
    }
}

/// Background task that reports a random beer count to the welcome
/// dashboard every minute, using `token` as its access key.
pub async fn welcome_task(dashboards: DashboardService, token: String) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));

    info!(dashboard_id = WELCOME_DASHBOARD, "Welcome task started (60s interval)");

    loop {
        interval.tick().await;

        let bottles = rand::thread_rng().gen_range(0..24);
        let update = beer_update(bottles);

        if let Err(e) = dashboards
            .put_metric(WELCOME_DASHBOARD, WELCOME_METRIC, &update, &token, Utc::now())
            .await
        {
            error!(
                error = %e,
                dashboard_id = WELCOME_DASHBOARD,
                "Failed to update welcome dashboard"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Backend, Storage};
    use std::sync::Arc;

    #[test]
    fn test_beer_update_status_thresholds() {
        assert_eq!(beer_update(0).status, "Critical");
        assert_eq!(beer_update(5).status, "Critical");
        assert_eq!(beer_update(6).status, "Warning");
        assert_eq!(beer_update(11).status, "Warning");
        assert_eq!(beer_update(12).status, "OK");
        assert!(beer_update(23).validate().is_ok());
    }

    #[tokio::test]
    async fn test_welcome_task_writes_demo_metric() {
        let storage = Storage::new(Backend::open("memory://").await.unwrap());
        let dashboards = DashboardService::new(Arc::new(storage), "");

        let task = tokio::spawn(welcome_task(dashboards.clone(), "welcome-token".to_string()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        task.abort();

        let dashboard = dashboards.load(WELCOME_DASHBOARD).await.unwrap();
        assert_eq!(dashboard.access_key, "welcome-token");
        assert_eq!(dashboard.metrics[WELCOME_METRIC].freshness, 120);
    }
}
