//! Panic recovery.
//!
//! The inner chain is polled under `catch_unwind`. A process-wide panic hook
//! records the message, location and a backtrace for panics raised while a
//! recovery scope is active on the current thread; those panics are logged as
//! one error event and answered with `500`. Panics elsewhere still reach the
//! previously installed hook.

use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::{poll_fn, BoxFuture};
use futures_util::FutureExt;

use crate::error::GatewayError;
use crate::http::pipeline::{Middleware, Next};

#[derive(Debug, Clone)]
pub struct PanicReport {
    pub message: String,
    pub location: Option<String>,
    pub backtrace: String,
}

thread_local! {
    static SCOPE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

static INSTALL_HOOK: Once = Once::new();

fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if SCOPE_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let report = PanicReport {
                message: payload_message(info.payload()),
                location: info.location().map(|l| format!("{}:{}", l.file(), l.line())),
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(report));
        }));
    });
}

fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Marks the current thread as inside a recovery scope while alive.
struct ScopeGuard;

impl ScopeGuard {
    fn enter() -> Self {
        SCOPE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        ScopeGuard
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Run `future`, converting a panic during any poll into a [`PanicReport`].
pub async fn catch_panic<F>(future: F) -> Result<F::Output, PanicReport>
where
    F: Future + Send,
{
    install_hook();

    let mut future = Box::pin(future);
    let scoped = poll_fn(move |cx| {
        let _scope = ScopeGuard::enter();
        future.as_mut().poll(cx)
    });

    match AssertUnwindSafe(scoped).catch_unwind().await {
        Ok(output) => Ok(output),
        Err(payload) => Err(LAST_PANIC
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_else(|| PanicReport {
                message: payload_message(payload.as_ref()),
                location: None,
                backtrace: String::new(),
            })),
    }
}

/// Outermost middleware: a panic anywhere inside becomes a `500`.
pub struct RecoveryMiddleware;

impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn call(self: Arc<Self>, request: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            let method = request.method().clone();
            let path = request.uri().path().to_string();

            match catch_panic(next.run(request)).await {
                Ok(response) => response,
                Err(report) => {
                    tracing::error!(
                        method = %method,
                        path = %path,
                        panic = %report.message,
                        location = report.location.as_deref().unwrap_or("unknown"),
                        backtrace = %report.backtrace,
                        "Recovered from panic"
                    );
                    GatewayError::PanicRecovered.into_response()
                }
            }
        })
    }
}
