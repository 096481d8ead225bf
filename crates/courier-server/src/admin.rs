//! HTTP admin surface: `/health` and `/metrics`.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::health::{self, HealthResponse};
use crate::lifecycle::ServerLifecycle;

/// Shared state accessible from admin handlers.
#[derive(Clone)]
pub struct AdminState {
    /// The server being observed.
    pub lifecycle: Arc<ServerLifecycle>,
    /// Prometheus handle; `/metrics` answers 404 without one.
    pub metrics: Option<PrometheusHandle>,
    /// When the process started.
    pub start_time: Instant,
}

impl AdminState {
    /// State observing `lifecycle`, with uptime counted from now.
    pub fn new(lifecycle: Arc<ServerLifecycle>, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            lifecycle,
            metrics,
            start_time: Instant::now(),
        }
    }
}

/// Build the admin router.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin router on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "admin endpoint listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health_handler(State(state): State<AdminState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.lifecycle.state(),
        state.lifecycle.registry().len(),
    ))
}

async fn metrics_handler(State(state): State<AdminState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::handler::DrainHandler;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn make_state(metrics: Option<PrometheusHandle>) -> AdminState {
        let lifecycle = Arc::new(ServerLifecycle::new(
            ServerConfig::ephemeral_loopback(),
            Arc::new(DrainHandler),
        ));
        AdminState::new(lifecycle, metrics)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_reports_stopped_server() {
        let (status, parsed) = get_json(router(make_state(None)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(parsed["status"], "unavailable");
        assert_eq!(parsed["state"], "stopped");
        assert_eq!(parsed["connections"], 0);
    }

    #[tokio::test]
    async fn health_reports_running_server() {
        let state = make_state(None);
        let lifecycle = Arc::clone(&state.lifecycle);
        let _ = lifecycle.start().await.unwrap();

        let (_, parsed) = get_json(router(state), "/health").await;
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["state"], "running");

        lifecycle.stop().await;
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_404() {
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = router(make_state(None)).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_renders_prometheus_text() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            metrics::counter!(crate::metrics::DISPATCH_TOTAL, "kind" => "text").increment(1);
        });

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = router(make_state(Some(handle))).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 100_000)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(crate::metrics::DISPATCH_TOTAL));
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let req = Request::builder().uri("/nonexistent").body(Body::empty()).unwrap();
        let resp = router(make_state(None)).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let token = CancellationToken::new();
        let task = tokio::spawn(serve(listener, make_state(None), token.clone()));

        token.cancel();
        task.await.unwrap().unwrap();
    }
}
