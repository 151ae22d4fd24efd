//! Reverse proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved target URL
//!     → cache.rs (lookup-or-create, one handler per target)
//!     → handler.rs (rewrite request, forward with deadline)
//!     → Backend response relayed, or 502/504
//! ```

pub mod cache;
pub mod handler;

pub use cache::ProxyCache;
pub use handler::{ProxyHandler, X_GATEWAY_REQUEST};
