//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! RouteConfig[] (on startup and every reload)
//!     → descriptor.rs (compile path, target strategy, timeout)
//!     → resolver.rs (static URL or discovery lookup)
//!     → proxy::ProxyCache (bind a forwarding handler)
//!     → table.rs (freeze as immutable RouteTable)
//!
//! Incoming request path
//!     → RouteTable::lookup
//!     → Route { descriptor, target_url, proxy } or no match
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; a reload builds a new one and swaps it in
//! - Unresolvable routes are skipped, never fatal
//! - Resolution happens at build time; in-flight requests keep their route

pub mod descriptor;
pub mod loader;
pub mod resolver;
pub mod table;

pub use descriptor::{RouteDescriptor, TargetStrategy, DEFAULT_ROUTE_TIMEOUT};
pub use loader::RouteLoader;
pub use resolver::TargetResolver;
pub use table::{Route, RouteTable};
