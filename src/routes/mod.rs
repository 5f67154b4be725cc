//! HTTP routes

pub mod dashboards;
pub mod health;
pub mod metrics;

use axum::{
    routing::{get, put},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
///
/// `request_timeout` bounds every request, including time spent waiting for
/// a dashboard lock; a timed out request drops its future and with it any
/// lock it holds.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(dashboards::index))
        .route("/health", get(health::health))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/create", get(dashboards::create_dashboard))
        .route(
            "/:dashboard_id",
            get(dashboards::show_dashboard).delete(dashboards::delete_dashboard),
        )
        .route(
            "/:dashboard_id/:metric_id",
            put(dashboards::put_metric).delete(dashboards::delete_metric),
        )
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Backend, Storage};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const KEY: &str = "supersecretkey";

    async fn app() -> Router {
        let storage = Storage::new(Backend::open("memory://").await.unwrap());
        let state = AppState::new(Arc::new(storage), "http://localhost:3000");
        router(state, Duration::from_secs(5))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            request = request.header(header::AUTHORIZATION, key);
        }
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn beer(value: f64) -> Value {
        json!({
            "title": "Amount of beer in the fridge",
            "description": "Bottles",
            "status": "OK",
            "value": value,
            "expires": 86400,
            "freshness": 3600
        })
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let app = app().await;

        let (status, body) = send(&app, Method::PUT, "/d1/beer", Some(KEY), Some(beer(10.0))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["dashboard_created"], true);

        let (status, body) = send(&app, Method::GET, "/d1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exists"], true);
        let metrics = body["metrics"].as_array().unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0]["id"], "beer");
        assert_eq!(metrics[0]["status"], "OK");
        assert_eq!(metrics[0]["value"], 10.0);
    }

    #[tokio::test]
    async fn test_token_prefix_is_accepted() {
        let app = app().await;
        let (status, _) = send(&app, Method::PUT, "/d1/beer", Some(KEY), Some(beer(1.0))).await;
        assert_eq!(status, StatusCode::OK);

        let token = format!("Token {}", KEY);
        let (status, _) = send(&app, Method::PUT, "/d1/beer", Some(&token), Some(beer(2.0))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_put_rejections() {
        let app = app().await;

        let (status, _) = send(&app, Method::PUT, "/d1/beer", Some("short"), Some(beer(1.0))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut invalid = beer(1.0);
        invalid["status"] = json!("Fine");
        let (status, body) = send(&app, Method::PUT, "/d1/beer", Some(KEY), Some(invalid)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["field"], "status");

        send(&app, Method::PUT, "/d1/beer", Some(KEY), Some(beer(1.0))).await;
        let (status, _) = send(&app, Method::PUT, "/d1/beer", Some("anotherlongkey"), Some(beer(1.0))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_mistyped_body_is_a_validation_error() {
        let app = app().await;
        let mistyped = json!({"status": "OK", "value": 1, "expires": "60"});

        let (status, body) =
            send(&app, Method::PUT, "/d1/beer", Some("short"), Some(mistyped.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], 401);

        let (status, body) = send(&app, Method::PUT, "/d1/beer", Some(KEY), Some(mistyped)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert_eq!(body["field"], "expires");

        send(&app, Method::PUT, "/d1/beer", Some(KEY), Some(beer(1.0))).await;
        let (status, _) = send(
            &app,
            Method::PUT,
            "/d1/beer",
            Some("anotherlongkey"),
            Some(json!({"value": "many"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, body) = send(&app, Method::GET, "/d1", None, None).await;
        assert_eq!(body["metrics"][0]["value"], 1.0);
    }

    #[tokio::test]
    async fn test_delete_dashboard_with_wrong_key_keeps_it() {
        let app = app().await;
        send(&app, Method::PUT, "/d1/beer", Some(KEY), Some(beer(1.0))).await;

        let (status, _) = send(&app, Method::DELETE, "/d1", Some("wrongsecretkey"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (_, body) = send(&app, Method::GET, "/d1", None, None).await;
        assert_eq!(body["exists"], true);

        let (status, _) = send(&app, Method::DELETE, "/d1", Some(KEY), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, Method::GET, "/d1", None, None).await;
        assert_eq!(body["exists"], false);

        let (status, _) = send(&app, Method::DELETE, "/d1", Some(KEY), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_metric() {
        let app = app().await;
        send(&app, Method::PUT, "/d1/beer", Some(KEY), Some(beer(1.0))).await;
        send(&app, Method::PUT, "/d1/wine", Some(KEY), Some(beer(1.0))).await;

        let (status, _) = send(&app, Method::DELETE, "/d1/beer", Some(KEY), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, Method::GET, "/d1", None, None).await;
        let ids: Vec<&str> = body["metrics"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["wine"]);
    }

    #[tokio::test]
    async fn test_create_redirects_to_fresh_id() {
        let app = app().await;
        let response = app
            .oneshot(Request::builder().uri("/create").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response.headers()[header::LOCATION].to_str().unwrap();
        assert!(location.starts_with('/'));
        assert_eq!(location.len(), 21);
    }

    #[tokio::test]
    async fn test_index_redirects_to_welcome() {
        let app = app().await;
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/welcome");
    }

    #[tokio::test]
    async fn test_route_names_are_not_dashboard_ids() {
        let app = app().await;
        for uri in ["/health/beer", "/metrics/beer", "/create/beer"] {
            let (status, body) = send(&app, Method::PUT, uri, Some(KEY), Some(beer(1.0))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["field"], "dashboard_id");
        }
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let app = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        send(&app, Method::PUT, "/d1/beer", Some(KEY), Some(beer(1.0))).await;
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("mondash_metric_updates_total 1"));
    }
}
