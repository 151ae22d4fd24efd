//! Gateway-local middlewares. Policy middlewares live with their subsystems
//! (`security`, `observability`).

pub mod recovery;
pub mod request_log;

pub use recovery::RecoveryMiddleware;
pub use request_log::RequestLogMiddleware;
