//! Edge HTTP gateway library.
//!
//! Requests pass a configurable middleware pipeline (recovery, logging,
//! metrics, admission control, authentication, tracing) and are forwarded to a
//! backend resolved from a hot-reloadable route table, statically or through
//! service discovery.

pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod security;

pub use config::{ConfigHandle, GatewayConfig, ReloadCoordinator};
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::{Gateway, GatewayBuilder, Shutdown};
