//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, generation pinning)
//!     → pipeline.rs (middleware chain, outermost first)
//!     → middleware/ (recovery, request log) + security/ + observability/
//!     → server.rs route dispatch (RouteTable lookup)
//!     → proxy::ProxyHandler (forward with deadline)
//!     → Send to client
//! ```

pub mod middleware;
pub mod pipeline;
pub mod server;

pub use pipeline::{handler_fn, Handler, Middleware, Next, Pipeline};
pub use server::{default_pipeline, GatewayServer};

/// Request correlation header, set on entry and echoed on the response.
pub const X_REQUEST_ID: &str = "x-request-id";
