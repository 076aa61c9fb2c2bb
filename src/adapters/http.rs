//! HTTP inbound adapter: health probe and job routes.

use crate::application::health::HealthGate;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(health: Arc<HealthGate>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/transcoder/health", get(health_handler))
        .route("/api/v1/transcoder/jobs", post(not_implemented))
        .route("/api/v1/transcoder/jobs/:id", get(not_implemented))
        .layer(TraceLayer::new_for_http())
        .with_state(health)
}

async fn health_handler(State(health): State<Arc<HealthGate>>) -> impl IntoResponse {
    let report = health.check().await;
    let status = if report.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

// Jobs are only started from upload events for now.
async fn not_implemented() -> impl IntoResponse {
    (
        StatusCode::NOT_IMPLEMENTED,
        Json(json!({ "error": "not implemented" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::health::HealthCheck;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use std::error::Error;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Down;

    #[async_trait]
    impl HealthCheck for Down {
        fn name(&self) -> &str {
            "broker"
        }

        async fn check(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
            Err("connection refused".into())
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_routes_report_ok() {
        let app = router(Arc::new(HealthGate::new(Duration::from_secs(1))));

        for uri in ["/health", "/api/v1/transcoder/health"] {
            let response = app.clone().oneshot(request(Method::GET, uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await["status"], "ok");
        }
    }

    #[tokio::test]
    async fn test_degraded_health_is_503() {
        let gate = HealthGate::new(Duration::from_secs(1)).with_check(Arc::new(Down));
        let response = router(Arc::new(gate))
            .oneshot(request(Method::GET, "/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["dependencies"]["broker"], "error: connection refused");
    }

    #[tokio::test]
    async fn test_job_routes_are_not_implemented() {
        let app = router(Arc::new(HealthGate::new(Duration::from_secs(1))));

        for (method, uri) in [
            (Method::POST, "/api/v1/transcoder/jobs"),
            (Method::GET, "/api/v1/transcoder/jobs/abc"),
        ] {
            let response = app.clone().oneshot(request(method, uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
            assert_eq!(body_json(response).await, json!({"error": "not implemented"}));
        }
    }
}
