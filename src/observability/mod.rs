//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline middlewares produce:
//!     → logging.rs (structured log events, live log level)
//!     → metrics.rs (counters, gauges, histograms)
//!     → tracing.rs (request spans, W3C traceparent)
//!
//! Consumers:
//!     → stdout
//!     → GET /metrics (Prometheus scrape)
//!     → backends (traceparent header)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all log lines of a request
//! - Metric updates are facade calls and never block the request
//! - Tracing is off by default

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::{init_logging, LogLevelHandle};
pub use self::metrics::MetricsMiddleware;
pub use self::tracing::{TraceContext, TracingMiddleware};
