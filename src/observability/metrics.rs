//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by path, method
//! - `gateway_errors_total` (counter): responses with status >= 400 by path, method, status_code
//! - `gateway_request_duration_seconds` (histogram): latency by path, method
//! - `gateway_rate_limited_total` (counter): requests denied by admission control
//! - `gateway_config_reloads_total` (counter): reload attempts by outcome
//! - `gateway_routes_active` (gauge): routes in the current table
//!
//! Updates go through the `metrics` facade and are no-ops until
//! [`init_metrics`] installs the Prometheus recorder.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{body::Body, http::Request, response::Response};
use futures_util::future::BoxFuture;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::http::pipeline::{Middleware, Next};

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder (once) and return its handle.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if let Err(err) = metrics::set_global_recorder(recorder) {
                tracing::warn!(error = %err, "Metrics recorder already installed");
            }
            handle
        })
        .clone()
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> String {
    init_metrics().render()
}

pub fn record_request(path: &str, method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "path" => path.to_string(),
        "method" => method.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "path" => path.to_string(),
        "method" => method.to_string()
    )
    .record(start.elapsed().as_secs_f64());

    if status >= 400 {
        metrics::counter!(
            "gateway_errors_total",
            "path" => path.to_string(),
            "method" => method.to_string(),
            "status_code" => status.to_string()
        )
        .increment(1);
    }
}

pub fn record_rate_limited() {
    metrics::counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_reload(outcome: &'static str) {
    metrics::counter!("gateway_config_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_routes_active(count: usize) {
    metrics::gauge!("gateway_routes_active").set(count as f64);
}

/// Records count, latency and error status of every request passing through.
pub struct MetricsMiddleware;

impl Middleware for MetricsMiddleware {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn call(self: Arc<Self>, request: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            let start = Instant::now();
            let path = request.uri().path().to_string();
            let method = request.method().to_string();

            let response = next.run(request).await;
            record_request(&path, &method, response.status().as_u16(), start);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::pipeline::{handler_fn, Pipeline};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn requests_and_errors_are_rendered() {
        init_metrics();

        let handler = Pipeline::new().with(MetricsMiddleware).then(handler_fn(|_req| async {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            response
        }));
        let request = Request::builder()
            .uri("/metrics-test/errors")
            .body(Body::empty())
            .unwrap();
        let response = handler.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let text = render();
        assert!(text.contains("gateway_requests_total"));
        assert!(text.contains("path=\"/metrics-test/errors\""));
        assert!(text.contains("status_code=\"503\""));
    }

    #[test]
    fn init_is_idempotent() {
        let first = init_metrics();
        let second = init_metrics();
        record_routes_active(3);
        assert!(first.render().contains("gateway_routes_active"));
        assert!(second.render().contains("gateway_routes_active"));
    }
}
