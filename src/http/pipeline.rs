//! Middleware composition.
//!
//! A middleware turns "next handler" into "handler". The pipeline holds an
//! ordered list and composes it in reverse, so the first declared middleware is
//! the outermost one: it runs first on the way in and last on the way out.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{body::Body, http::Request, response::Response};
use futures_util::future::BoxFuture;
use tower::{service_fn, util::BoxCloneSyncService, ServiceExt};

/// A type-erased request handler.
pub type Handler = BoxCloneSyncService<Request<Body>, Response, Infallible>;

/// Build a [`Handler`] from an async function.
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: std::future::Future<Output = Response> + Send + 'static,
{
    Handler::new(service_fn(move |request| {
        let response = f(request);
        async move { Ok::<_, Infallible>(response.await) }
    }))
}

/// The rest of the chain, as seen from inside a middleware.
pub struct Next {
    inner: Handler,
}

impl Next {
    /// Pass the request on.
    pub async fn run(self, request: Request<Body>) -> Response {
        match self.inner.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// A request interceptor.
///
/// Implementations either short-circuit by returning their own response or call
/// `next.run(request)`. A disabled feature must call `next` with the request
/// untouched.
pub trait Middleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    fn call(self: Arc<Self>, request: Request<Body>, next: Next) -> BoxFuture<'static, Response>;
}

/// Wrap a single handler with one middleware.
pub fn wrap(middleware: Arc<dyn Middleware>, next: Handler) -> Handler {
    handler_fn(move |request| {
        let middleware = Arc::clone(&middleware);
        let next = Next { inner: next.clone() };
        middleware.call(request, next)
    })
}

/// Ordered middleware list, outermost first.
#[derive(Default, Clone)]
pub struct Pipeline {
    layers: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware; it will run inside every one added before it.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|m| m.name()).collect()
    }

    /// Compose every middleware around `terminal`.
    pub fn then(&self, terminal: Handler) -> Handler {
        self.layers
            .iter()
            .rev()
            .fold(terminal, |next, middleware| wrap(Arc::clone(middleware), next))
    }
}
