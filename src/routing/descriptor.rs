//! Route descriptors compiled from configuration.

use std::time::Duration;

use crate::config::schema::RouteConfig;
use crate::error::GatewayError;

/// Timeout used when a route's duration string does not parse.
pub const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_secs(10);

/// How a route finds its backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStrategy {
    /// Fixed target URL.
    Static(String),
    /// Logical service name resolved through discovery.
    Service(String),
}

/// Immutable description of one route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub path: String,
    pub target: TargetStrategy,
    pub timeout: Duration,
}

impl RouteDescriptor {
    /// Compile a route entry.
    ///
    /// A service name takes precedence when discovery is available; otherwise the
    /// static target is used. A route with neither is rejected so the loader can
    /// skip it.
    pub fn from_config(route: &RouteConfig, discovery_available: bool) -> Result<Self, GatewayError> {
        let service = route.service_name.as_deref().filter(|s| !s.is_empty());
        let target_url = route.target_url.as_deref().filter(|s| !s.is_empty());

        let target = match (service, target_url) {
            (Some(name), _) if discovery_available => TargetStrategy::Service(name.to_string()),
            (_, Some(url)) => TargetStrategy::Static(url.to_string()),
            _ => return Err(GatewayError::NoTarget(route.path.clone())),
        };

        let timeout = parse_timeout(&route.timeout).unwrap_or_else(|| {
            tracing::warn!(
                path = %route.path,
                timeout = %route.timeout,
                default = ?DEFAULT_ROUTE_TIMEOUT,
                "Invalid route timeout, using default"
            );
            DEFAULT_ROUTE_TIMEOUT
        });

        Ok(Self {
            path: route.path.clone(),
            target,
            timeout,
        })
    }
}

/// Parse a duration string such as "1s", "250ms" or "1m30s".
pub fn parse_timeout(raw: &str) -> Option<Duration> {
    humantime::parse_duration(raw.trim())
        .ok()
        .filter(|d| !d.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(target_url: Option<&str>, service_name: Option<&str>, timeout: &str) -> RouteConfig {
        RouteConfig {
            path: "/api/users".into(),
            target_url: target_url.map(Into::into),
            service_name: service_name.map(Into::into),
            timeout: timeout.into(),
        }
    }

    #[test]
    fn parses_common_durations() {
        assert_eq!(parse_timeout("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_timeout("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_timeout("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_timeout("soon"), None);
        assert_eq!(parse_timeout(""), None);
    }

    #[test]
    fn bad_timeout_falls_back_to_default() {
        let descriptor =
            RouteDescriptor::from_config(&route(Some("http://a:1"), None, "forever"), false).unwrap();
        assert_eq!(descriptor.timeout, DEFAULT_ROUTE_TIMEOUT);
    }

    #[test]
    fn service_name_needs_discovery() {
        let cfg = route(Some("http://fallback:80"), Some("user-service"), "1s");
        assert_eq!(
            RouteDescriptor::from_config(&cfg, true).unwrap().target,
            TargetStrategy::Service("user-service".into())
        );
        assert_eq!(
            RouteDescriptor::from_config(&cfg, false).unwrap().target,
            TargetStrategy::Static("http://fallback:80".into())
        );
    }

    #[test]
    fn route_without_target_is_rejected() {
        let err = RouteDescriptor::from_config(&route(None, Some("svc"), "1s"), false).unwrap_err();
        assert!(matches!(err, GatewayError::NoTarget(path) if path == "/api/users"));

        let err = RouteDescriptor::from_config(&route(Some(""), None, "1s"), true).unwrap_err();
        assert!(matches!(err, GatewayError::NoTarget(_)));
    }
}
