//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → GatewayConfig (immutable)
//!     → routing::RouteLoader builds the matching RouteTable
//!     → handle.rs publishes both as one Generation
//!
//! On change:
//!     watcher.rs / SIGHUP / discovery refresh timer
//!     → reload.rs (parse, build table, single swap)
//!     → requests already in flight keep their pinned Generation
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full reload
//! - All fields have defaults to allow minimal configs
//! - A bad edit never degrades a running gateway

pub mod handle;
pub mod loader;
pub mod reload;
pub mod schema;
pub mod watcher;

pub use handle::{ConfigHandle, Generation};
pub use loader::{load_config, parse_config, ConfigError};
pub use reload::ReloadCoordinator;
pub use schema::GatewayConfig;
pub use schema::RouteConfig;
pub use watcher::ConfigWatcher;
