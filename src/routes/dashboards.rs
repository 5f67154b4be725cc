//! Dashboard and metric endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap},
    response::Redirect,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{AppError, Result};
use crate::models::MetricUpdate;
use crate::state::AppState;
use crate::tasks::welcome::WELCOME_DASHBOARD;
use crate::view::DashboardView;

/// Response for successful mutations
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_created: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_created: Option<bool>,
}

impl MutationResponse {
    fn ok() -> Self {
        Self {
            status: "OK",
            dashboard_created: None,
            metric_created: None,
        }
    }
}

/// Access key from the Authorization header, with or without a `Token ` prefix
fn extract_credential(headers: &HeaderMap) -> &str {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Token ").unwrap_or(v))
        .unwrap_or_default()
}

fn observe<T>(state: &AppState, dashboard_id: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        state.metrics.record_error(e);
        match e {
            AppError::Storage(_) | AppError::Corrupt(_) | AppError::InternalError(_) => {
                error!(error = %e, dashboard_id = %dashboard_id, "Dashboard request failed");
            }
            AppError::Unauthorized(_) | AppError::Validation(_) => {
                warn!(error = %e, dashboard_id = %dashboard_id, "Dashboard request rejected");
            }
            AppError::NotFound(_) => {}
        }
    }
    result
}

/// GET /
pub async fn index() -> Redirect {
    Redirect::temporary(&format!("/{}", WELCOME_DASHBOARD))
}

/// GET /create
///
/// Redirects to a fresh, unused dashboard id.
pub async fn create_dashboard(State(state): State<AppState>) -> Result<Redirect> {
    let id = observe(&state, "", state.dashboards.propose_id().await)?;
    Ok(Redirect::temporary(&format!("/{}", id)))
}

/// GET /:dashboard_id
///
/// Returns the dashboard with expired metrics removed and statuses derived.
pub async fn show_dashboard(
    State(state): State<AppState>,
    Path(dashboard_id): Path<String>,
) -> Result<Json<DashboardView>> {
    let view = state.dashboards.view(&dashboard_id, Utc::now()).await;
    observe(&state, &dashboard_id, view).map(Json)
}

/// PUT /:dashboard_id/:metric_id
///
/// Creates or updates a metric. The first write to an unknown dashboard
/// creates it and binds the Authorization value as its access key.
pub async fn put_metric(
    State(state): State<AppState>,
    Path((dashboard_id, metric_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: std::result::Result<Json<MetricUpdate>, JsonRejection>,
) -> Result<Json<MutationResponse>> {
    let credential = extract_credential(&headers);
    let Json(update) = match body {
        Ok(body) => body,
        Err(rejection) => {
            // Credential problems are reported ahead of body problems
            let checked = state.dashboards.check_credential(&dashboard_id, credential).await;
            let result: Result<Json<MutationResponse>> = match checked {
                Ok(()) => Err(MetricUpdate::body_error(&rejection.body_text()).into()),
                Err(e) => Err(e),
            };
            return observe(&state, &dashboard_id, result);
        }
    };
    let outcome = state
        .dashboards
        .put_metric(&dashboard_id, &metric_id, &update, credential, Utc::now())
        .await;
    let outcome = observe(&state, &dashboard_id, outcome)?;
    state.metrics.inc_updates();

    Ok(Json(MutationResponse {
        status: "OK",
        dashboard_created: Some(outcome.dashboard_created),
        metric_created: Some(outcome.metric_created),
    }))
}

/// DELETE /:dashboard_id/:metric_id
pub async fn delete_metric(
    State(state): State<AppState>,
    Path((dashboard_id, metric_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<MutationResponse>> {
    let credential = extract_credential(&headers);
    let result = state
        .dashboards
        .delete_metric(&dashboard_id, &metric_id, credential)
        .await;
    observe(&state, &dashboard_id, result)?;
    state.metrics.inc_deletes();
    Ok(Json(MutationResponse::ok()))
}

/// DELETE /:dashboard_id
pub async fn delete_dashboard(
    State(state): State<AppState>,
    Path(dashboard_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MutationResponse>> {
    let credential = extract_credential(&headers);
    let result = state.dashboards.delete_dashboard(&dashboard_id, credential).await;
    observe(&state, &dashboard_id, result)?;
    state.metrics.inc_deletes();
    Ok(Json(MutationResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_credential() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_credential(&headers), "");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("supersecretkey"));
        assert_eq!(extract_credential(&headers), "supersecretkey");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token supersecretkey"));
        assert_eq!(extract_credential(&headers), "supersecretkey");
    }
}
