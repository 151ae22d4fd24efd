//! Gateway error taxonomy.
//!
//! Every per-request failure ends here: it is converted into an HTTP status and a
//! short body, and never touches shared state. Route-build failures use the same
//! type so the route loader can log them uniformly before skipping the route.

use std::time::Duration;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::security::auth::AuthError;

/// Errors raised while building routes or serving a request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration could not be read or parsed; the reload was aborted.
    #[error("configuration error: {0}")]
    ConfigParse(String),

    /// The discovery backend failed to answer.
    #[error("service discovery failed for '{service}': {source}")]
    Discovery {
        service: String,
        #[source]
        source: DiscoveryError,
    },

    /// Discovery answered but reported no healthy instance.
    #[error("no healthy instances registered for '{0}'")]
    NoInstances(String),

    /// The route names neither a usable static target nor a discoverable service.
    #[error("route '{0}' has no target")]
    NoTarget(String),

    /// The target URL is malformed or uses an unsupported scheme.
    #[error("invalid target address '{target}': {reason}")]
    TargetAddress { target: String, reason: String },

    /// No route is registered for the request path.
    #[error("no route registered for '{0}'")]
    RouteNotFound(String),

    /// The backend did not answer within the route deadline.
    #[error("backend '{target}' did not respond within {timeout:?}")]
    Timeout { target: String, timeout: Duration },

    /// Dial or connection failure towards the backend.
    #[error("backend '{target}' unreachable: {reason}")]
    Transport { target: String, reason: String },

    /// Missing or invalid credentials.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Token bucket denied admission.
    #[error("rate limit exceeded")]
    AdmissionDenied,

    /// A panic was caught in the request pipeline.
    #[error("internal server error")]
    PanicRecovered,
}

impl GatewayError {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Transport { .. }
            | GatewayError::Discovery { .. }
            | GatewayError::NoInstances(_)
            | GatewayError::NoTarget(_)
            | GatewayError::TargetAddress { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AdmissionDenied => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::ConfigParse(_) | GatewayError::PanicRecovered => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing body. Backend details stay in the logs.
    fn public_message(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound(_) => "No matching route found",
            GatewayError::Timeout { .. } => "Upstream request timed out",
            GatewayError::Auth(_) => "Unauthorized",
            GatewayError::AdmissionDenied => "Rate limit exceeded",
            GatewayError::PanicRecovered | GatewayError::ConfigParse(_) => {
                "Internal server error"
            }
            _ => "Upstream request failed",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.public_message()));
        *response.status_mut() = self.status_code();
        response
    }
}
