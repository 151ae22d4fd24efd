//! Distributed tracing support.
//!
//! When `[tracing] enabled`, every request runs inside a
//! `gateway-request-handling` span and carries W3C Trace Context to the backend:
//! an inbound `traceparent` keeps its trace id, otherwise a new one is minted, and
//! the gateway's own span id is written as the new parent.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    response::Response,
};
use futures_util::future::BoxFuture;
use tracing::Instrument;

use crate::config::ConfigHandle;
use crate::http::pipeline::{Middleware, Next};

pub const TRACEPARENT: &str = "traceparent";

/// Trace identifiers for the current request, attached as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub sampled: bool,
}

impl TraceContext {
    /// Continue the trace described by `traceparent`, or start a new one.
    pub fn continue_or_start(traceparent: Option<&str>) -> Self {
        match traceparent.and_then(parse_traceparent) {
            Some((trace_id, sampled)) => Self {
                trace_id,
                span_id: new_span_id(),
                sampled,
            },
            None => Self {
                trace_id: uuid::Uuid::new_v4().simple().to_string(),
                span_id: new_span_id(),
                sampled: true,
            },
        }
    }

    pub fn header_value(&self) -> String {
        let flags = if self.sampled { "01" } else { "00" };
        format!("00-{}-{}-{}", self.trace_id, self.span_id, flags)
    }
}

fn new_span_id() -> String {
    format!("{:016x}", fastrand::u64(1..))
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Trace id and sampled flag from a version-00 `traceparent`.
fn parse_traceparent(value: &str) -> Option<(String, bool)> {
    let mut parts = value.trim().split('-');
    let version = parts.next()?;
    let trace_id = parts.next()?;
    let parent_id = parts.next()?;
    let flags = parts.next()?;
    if parts.next().is_some() || version != "00" {
        return None;
    }
    if !is_lower_hex(trace_id, 32) || trace_id.bytes().all(|b| b == b'0') {
        return None;
    }
    if !is_lower_hex(parent_id, 16) || parent_id.bytes().all(|b| b == b'0') {
        return None;
    }
    if !is_lower_hex(flags, 2) {
        return None;
    }
    let sampled = u8::from_str_radix(flags, 16).ok()? & 0x01 == 1;
    Some((trace_id.to_string(), sampled))
}

pub struct TracingMiddleware {
    config: ConfigHandle,
}

impl TracingMiddleware {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }
}

impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn call(self: Arc<Self>, mut request: Request<Body>, next: Next) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            let generation = self.config.for_request(&request);
            let settings = &generation.config.tracing;
            if !settings.enabled {
                return next.run(request).await;
            }

            let inbound = request
                .headers()
                .get(TRACEPARENT)
                .and_then(|v| v.to_str().ok());
            let context = TraceContext::continue_or_start(inbound);

            if let Ok(value) = HeaderValue::from_str(&context.header_value()) {
                request.headers_mut().insert(TRACEPARENT, value);
            }

            let span = tracing::info_span!(
                "gateway-request-handling",
                service = %settings.service_name,
                trace_id = %context.trace_id,
                span_id = %context.span_id,
                method = %request.method(),
                path = %request.uri().path(),
            );
            request.extensions_mut().insert(context);

            next.run(request).instrument(span).await
        })
    }
}
