//! Structured logging.
//!
//! Events go through `tracing` to a fmt subscriber. The level comes from
//! `RUST_LOG` when set, otherwise from `log_level` in the config; in the latter
//! case a reload that changes `log_level` is applied without restart.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to parse log filter '{filter}': {reason}")]
    FilterParse { filter: String, reason: String },

    #[error("failed to initialize logging: {0}")]
    Init(String),

    #[error("failed to update log level: {0}")]
    Reload(String),
}

/// Handle for changing the log level of the installed subscriber.
#[derive(Clone)]
pub struct LogLevelHandle {
    inner: reload::Handle<EnvFilter, Registry>,
    from_env: bool,
}

impl LogLevelHandle {
    /// Apply a new level. No-op when the filter came from `RUST_LOG`.
    pub fn set_level(&self, level: &str) -> Result<(), LoggingError> {
        if self.from_env {
            return Ok(());
        }
        let filter = build_filter(level)?;
        self.inner
            .reload(filter)
            .map_err(|err| LoggingError::Reload(err.to_string()))
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(level).map_err(|err| LoggingError::FilterParse {
        filter: level.to_string(),
        reason: err.to_string(),
    })
}

/// Install the global subscriber.
pub fn init_logging(level: &str) -> Result<LogLevelHandle, LoggingError> {
    let (filter, from_env) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (build_filter(level)?, false),
    };

    let (filter, inner) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|err| LoggingError::Init(err.to_string()))?;

    Ok(LogLevelHandle { inner, from_env })
}
