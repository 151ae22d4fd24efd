//! Forwarding handler bound to one target.
//!
//! # Responsibilities
//! - Rewrite the inbound request onto the target (scheme, authority, path prefix)
//! - Enforce the route deadline on the outbound call
//! - Map transport failures to 502 and deadline expiry to 504
//!
//! # Design Decisions
//! - Bodies stream through in both directions; the route deadline covers the
//!   whole exchange, so a response body still streaming at the deadline is cut
//! - Hop-by-hop headers are dropped in both directions
//! - Dropping the returned future cancels the outbound call

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{
        header::{self, HeaderMap, HeaderName, HeaderValue},
        uri::{Authority, PathAndQuery, Scheme},
        Request, Uri,
    },
    response::{IntoResponse, Response},
};
use futures_util::{stream, StreamExt};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use tokio::time::Instant;
use url::Url;

use crate::error::GatewayError;

/// Header marking requests that went through the gateway.
pub const X_GATEWAY_REQUEST: &str = "x-gateway-request";

pub type HttpClient = Client<HttpConnector, Body>;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Connection-scoped headers that never cross the proxy.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Append the client address to `X-Forwarded-For`.
fn append_forwarded_for(headers: &mut HeaderMap, client: SocketAddr) {
    let ip = client.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.trim().is_empty() => format!("{prior}, {ip}"),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Relay `body`, failing the stream once `deadline` passes.
fn with_deadline(body: Body, deadline: Instant, target: String) -> Body {
    let chunks = stream::unfold(
        Some((body.into_data_stream(), Box::pin(tokio::time::sleep_until(deadline)))),
        move |state| {
            let target = target.clone();
            async move {
                let (mut data, mut expired) = state?;
                tokio::select! {
                    chunk = data.next() => chunk.map(|chunk| (chunk, Some((data, expired)))),
                    _ = &mut expired => {
                        tracing::warn!(target = %target, "Route deadline hit while streaming response body");
                        let err = io::Error::new(io::ErrorKind::TimedOut, "route deadline exceeded");
                        Some((Err(axum::Error::new(err)), None))
                    }
                }
            }
        },
    );
    Body::from_stream(chunks)
}

/// A ready-to-use reverse proxy for a single target URL.
pub struct ProxyHandler {
    target: String,
    authority: Authority,
    base_path: String,
    client: HttpClient,
}

impl fmt::Debug for ProxyHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHandler")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

fn invalid(target: &str, reason: impl Into<String>) -> GatewayError {
    GatewayError::TargetAddress {
        target: target.to_string(),
        reason: reason.into(),
    }
}

impl ProxyHandler {
    /// Parse `target` and bind a handler to it.
    pub fn new(target: &str, client: HttpClient) -> Result<Self, GatewayError> {
        let url = Url::parse(target).map_err(|e| invalid(target, e.to_string()))?;
        // The transport only speaks plain HTTP.
        if url.scheme() != "http" {
            return Err(invalid(target, format!("unsupported scheme '{}'", url.scheme())));
        }
        let host = url.host_str().ok_or_else(|| invalid(target, "missing host"))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority).map_err(|e| invalid(target, e.to_string()))?;

        Ok(Self {
            target: target.to_string(),
            authority,
            base_path: url.path().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// The target URL this handler forwards to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Outbound URI for an inbound one.
    pub fn rewrite_uri(&self, inbound: &Uri) -> Result<Uri, GatewayError> {
        let mut path = format!("{}{}", self.base_path, inbound.path());
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = inbound.query() {
            path.push('?');
            path.push_str(query);
        }
        let path_and_query =
            PathAndQuery::from_str(&path).map_err(|e| invalid(&self.target, e.to_string()))?;

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| invalid(&self.target, e.to_string()))
    }

    /// Forward `request`, converting failures into error responses.
    pub async fn forward(&self, request: Request<Body>, timeout: Duration) -> Response {
        let path = request.uri().path().to_string();
        match self.try_forward(request, timeout).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(path = %path, target = %self.target, error = %err, "Reverse proxy error");
                err.into_response()
            }
        }
    }

    /// Forward `request` with a deadline of `timeout`.
    pub async fn try_forward(
        &self,
        request: Request<Body>,
        timeout: Duration,
    ) -> Result<Response, GatewayError> {
        let deadline = Instant::now() + timeout;
        let (mut parts, body) = request.into_parts();
        parts.uri = self.rewrite_uri(&parts.uri)?;

        strip_hop_by_hop(&mut parts.headers);
        if let Some(ConnectInfo(client)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut parts.headers, *client);
        }

        let host = HeaderValue::from_str(self.authority.as_str())
            .map_err(|e| invalid(&self.target, e.to_string()))?;
        parts.headers.insert(header::HOST, host);
        parts
            .headers
            .insert(X_GATEWAY_REQUEST, HeaderValue::from_static("true"));

        let outbound = Request::from_parts(parts, body);
        match tokio::time::timeout_at(deadline, self.client.request(outbound)).await {
            Ok(Ok(response)) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                let body = with_deadline(Body::new(body), deadline, self.target.clone());
                Ok(Response::from_parts(parts, body))
            }
            Ok(Err(e)) => Err(GatewayError::Transport {
                target: self.target.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(GatewayError::Timeout {
                target: self.target.clone(),
                timeout,
            }),
        }
    }
}
