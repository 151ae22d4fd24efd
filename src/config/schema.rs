//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{de, Deserialize, Deserializer, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listening port.
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Upper bound on draining in-flight requests at shutdown.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace_period: Duration,

    /// Token bucket admission control.
    pub rate_limit: RateLimitConfig,

    /// Authentication settings.
    pub auth: AuthConfig,

    /// Service discovery settings.
    pub service_discovery: ServiceDiscoveryConfig,

    /// Distributed tracing settings.
    pub tracing: TracingConfig,

    /// Route definitions mapping paths to targets.
    pub routes: Vec<RouteConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "info".to_string(),
            shutdown_grace_period: Duration::from_secs(30),
            rate_limit: RateLimitConfig::default(),
            auth: AuthConfig::default(),
            service_discovery: ServiceDiscoveryConfig::default(),
            tracing: TracingConfig::default(),
            routes: Vec::new(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests admitted per interval (bucket capacity). Zero or negative
    /// selects the default of 100.
    pub requests: i64,

    /// Refill window. Zero or negative selects the default of 1s.
    #[serde(
        serialize_with = "humantime_serde::serialize",
        deserialize_with = "non_positive_as_zero"
    )]
    pub interval: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests: 100,
            interval: Duration::from_secs(1),
        }
    }
}

/// Humantime duration where a leading '-' reads as zero.
fn non_positive_as_zero<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    match raw.strip_prefix('-') {
        Some(magnitude) => humantime::parse_duration(magnitude.trim())
            .map(|_| Duration::ZERO)
            .map_err(de::Error::custom),
        None => humantime::parse_duration(raw).map_err(de::Error::custom),
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,

    /// "jwt", "oauth2" or "none".
    #[serde(rename = "type")]
    pub auth_type: String,

    pub jwt: JwtConfig,

    pub oauth2: OAuth2Config,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            auth_type: "none".to_string(),
            jwt: JwtConfig::default(),
            oauth2: OAuth2Config::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HMAC secret used to verify bearer tokens.
    pub secret_key: String,
}

/// OAuth2 client-credentials settings.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuth2Config {
    pub enabled: bool,
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Service discovery configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceDiscoveryConfig {
    pub enabled: bool,

    /// Discovery backend; only "consul" is supported.
    #[serde(rename = "type")]
    pub discovery_type: String,

    /// How one instance is picked among the healthy ones.
    pub selection: InstanceSelection,

    /// Route table rebuild period so discovery changes are picked up.
    /// Zero disables the periodic refresh.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,

    pub consul: ConsulConfig,
}

impl Default for ServiceDiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            discovery_type: "consul".to_string(),
            selection: InstanceSelection::First,
            refresh_interval: Duration::from_secs(30),
            consul: ConsulConfig::default(),
        }
    }
}

/// Instance selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceSelection {
    /// First instance in discovery order.
    #[default]
    First,
    /// Uniformly random instance.
    Random,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsulConfig {
    /// Consul agent address, e.g. "http://127.0.0.1:8500".
    pub address: String,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8500".to_string(),
        }
    }
}

/// Distributed tracing configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    pub enabled: bool,
    pub service_name: String,
    /// Collector agent address; exporter wiring lives outside the gateway.
    pub agent_address: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "edge-gateway".to_string(),
            agent_address: "localhost:6831".to_string(),
        }
    }
}

/// A single route entry.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Exact path, or a prefix ending in "/*".
    pub path: String,

    /// Static target (optional when a service name is given).
    pub target_url: Option<String>,

    /// Logical service resolved through discovery.
    pub service_name: Option<String>,

    /// Duration string such as "1s" or "250ms"; unparseable values fall back to 10s.
    pub timeout: String,
}
