//! Prometheus exposition and HTTP request metrics
//!
//! `GET /metrics` renders the global `metrics-exporter-prometheus` recorder.
//! `http_metrics_middleware` records `http_requests_total` (counter) and
//! `http_request_duration_seconds` (histogram) for every routed request.

use std::sync::Mutex;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Label used for requests that matched no route, keeping label cardinality bounded.
const UNMATCHED_PATH: &str = "unmatched";

static PROMETHEUS: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Install the process-wide Prometheus recorder once and return its handle.
///
/// The global recorder can only be set once per process, so later calls
/// (a restart within the same process) get the original handle back.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let mut installed = PROMETHEUS.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(handle) = installed.as_ref() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Prometheus metrics recorder installed");
    *installed = Some(handle.clone());
    Ok(handle)
}

/// Shared state for the metrics endpoint
#[derive(Clone)]
pub struct MetricsState {
    pub handle: PrometheusHandle,
}

/// `GET /metrics`, Prometheus scrape endpoint (no auth)
pub async fn prometheus_metrics(State(state): State<MetricsState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        state.handle.render(),
    )
}

pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|mp| mp.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed().as_secs_f64();

    let status = response.status().as_u16().to_string();

    metrics::counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("http_request_duration_seconds", "method" => method, "path" => path)
        .record(duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn recorder_is_installed_once_and_rendered() {
        let first = install_recorder().unwrap();
        let second = install_recorder().unwrap();

        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .route(
                "/metrics",
                get(prometheus_metrics).with_state(MetricsState { handle: second }),
            )
            .layer(middleware::from_fn(http_metrics_middleware));

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let rendered = first.render();
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("path=\"/ping\""));
    }
}
