//! Request admission and authentication.
//!
//! # Data Flow
//! ```text
//! Incoming request (inside the pipeline):
//!     → rate_limit.rs (token bucket, 429 on denial)
//!     → auth/ (JWT verification or OAuth2 token attach, 401 on failure)
//!     → inner pipeline
//! ```
//!
//! # Design Decisions
//! - Both policies re-read the live config on every request
//! - A disabled policy forwards the request untouched
//! - Bucket and authenticators are rebuilt only when their settings change

pub mod auth;
pub mod rate_limit;

pub use auth::{AuthError, AuthMiddleware, Claims};
pub use rate_limit::{RateLimitMiddleware, TokenBucket};
