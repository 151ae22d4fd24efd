//! Gateway dispatcher.
//!
//! # Responsibilities
//! - Create the Axum router: `/metrics` plus a catch-all gateway service
//! - Pin the current config generation to each request
//! - Run the middleware pipeline around the route dispatch
//! - Serve with a bounded graceful shutdown
//!
//! `/metrics` is served outside the pipeline, so it is never rate limited or
//! authenticated.

use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;

use axum::{
    body::Body,
    http::{header, Request},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tower::ServiceExt;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::config::ConfigHandle;
use crate::error::GatewayError;
use crate::http::middleware::{RecoveryMiddleware, RequestLogMiddleware};
use crate::http::pipeline::{handler_fn, Handler, Pipeline};
use crate::observability::{metrics, MetricsMiddleware, TracingMiddleware};
use crate::security::{AuthMiddleware, RateLimitMiddleware};

/// The standard pipeline, outer to inner: recovery, request log, metrics,
/// rate limit, auth, tracing.
pub fn default_pipeline(config: &ConfigHandle) -> Pipeline {
    Pipeline::new()
        .with(RecoveryMiddleware)
        .with(RequestLogMiddleware)
        .with(MetricsMiddleware)
        .with(RateLimitMiddleware::new(config.clone()))
        .with(AuthMiddleware::new(config.clone()))
        .with(TracingMiddleware::new(config.clone()))
}

/// Terminal handler: look up the route in the pinned generation and forward.
pub fn route_dispatch(config: ConfigHandle) -> Handler {
    handler_fn(move |request: Request<Body>| {
        let config = config.clone();
        async move {
            let generation = config.for_request(&request);
            let path = request.uri().path();
            match generation.routes.lookup(path) {
                Some(route) => route.proxy.forward(request, route.descriptor.timeout).await,
                None => {
                    tracing::warn!(path = %path, "No route matched");
                    GatewayError::RouteNotFound(path.to_string()).into_response()
                }
            }
        }
    })
}

async fn render_metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    config: ConfigHandle,
    router: Router,
}

impl GatewayServer {
    /// Server with the standard pipeline.
    pub fn new(config: ConfigHandle) -> Self {
        let pipeline = default_pipeline(&config);
        Self::with_pipeline(config, pipeline)
    }

    pub fn with_pipeline(config: ConfigHandle, pipeline: Pipeline) -> Self {
        tracing::info!(middlewares = ?pipeline.names(), "Request pipeline assembled");
        let handler = pipeline.then(route_dispatch(config.clone()));
        let router = Self::build_router(config.clone(), handler);
        Self { config, router }
    }

    fn build_router(config: ConfigHandle, handler: Handler) -> Router {
        let gateway = handler_fn(move |mut request: Request<Body>| {
            let handler = handler.clone();
            request.extensions_mut().insert(config.snapshot());
            async move {
                match handler.oneshot(request).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                }
            }
        });

        Router::new()
            .route("/metrics", get(render_metrics))
            .fallback_service(gateway)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain for at most the configured grace
    /// period.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let (draining_tx, mut draining_rx) = watch::channel(false);
        let signal = async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining in-flight requests");
            let _ = draining_tx.send(true);
        };

        let service = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, service)
            .with_graceful_shutdown(signal)
            .into_future();

        let config = self.config;
        let grace_expired = async move {
            while !*draining_rx.borrow_and_update() {
                if draining_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            let grace = config.get().shutdown_grace_period;
            tokio::time::sleep(grace).await;
            grace
        };

        tokio::select! {
            result = server => result?,
            grace = grace_expired => {
                tracing::warn!(grace = ?grace, "Grace period elapsed, closing with requests in flight");
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
