//! Service discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Route with service_name
//!     → routing::resolver asks ServiceDiscovery for healthy instances
//!     → consul.rs queries the agent health endpoint
//!     → Vec<ServiceInstance> (fresh per call, never cached here)
//! ```
//!
//! # Design Decisions
//! - Discovery failures are per-route, never fatal to the gateway
//! - Implementations are object safe so the backend is chosen at startup

pub mod consul;

use std::collections::HashMap;

use futures_util::future::BoxFuture;
use thiserror::Error;

pub use consul::ConsulDiscovery;

/// A live instance of a logical service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub id: String,
    pub service: String,
    pub host: String,
    pub port: u16,
    pub metadata: HashMap<String, String>,
}

impl ServiceInstance {
    /// Base URL of this instance.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Error returned by a discovery backend.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("discovery backend returned status {0}")]
    Status(u16),

    #[error("unsupported discovery type '{0}'")]
    Unsupported(String),
}

/// Source of healthy instances for a named service.
pub trait ServiceDiscovery: Send + Sync {
    fn get_instances<'a>(
        &'a self,
        service_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ServiceInstance>, DiscoveryError>>;
}
