//! Startup orchestration.
//!
//! Builds the initial generation (config + route table), the reload
//! coordinator and the server, then runs them with their background tasks.
//! Discovery or route errors at startup only leave routes out; the caller
//! decides whether an unreadable config is fatal.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{ConfigHandle, ConfigWatcher, GatewayConfig, ReloadCoordinator};
use crate::discovery::ServiceDiscovery;
use crate::http::GatewayServer;
use crate::lifecycle::signals::{Signal, Signals};
use crate::lifecycle::Shutdown;
use crate::observability::LogLevelHandle;
use crate::proxy::ProxyCache;
use crate::routing::RouteLoader;

/// A fully wired gateway, ready to serve.
pub struct Gateway {
    pub config: ConfigHandle,
    pub coordinator: Arc<ReloadCoordinator>,
    pub server: GatewayServer,
}

/// Startup inputs.
pub struct GatewayBuilder {
    config_path: PathBuf,
    config: GatewayConfig,
    discovery: Option<Arc<dyn ServiceDiscovery>>,
    log_level: Option<LogLevelHandle>,
    port_override: bool,
}

impl GatewayBuilder {
    pub fn new(config_path: impl Into<PathBuf>, config: GatewayConfig) -> Self {
        Self {
            config_path: config_path.into(),
            config,
            discovery: None,
            log_level: None,
            port_override: false,
        }
    }

    pub fn discovery(mut self, discovery: Arc<dyn ServiceDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn log_level(mut self, log_level: LogLevelHandle) -> Self {
        self.log_level = Some(log_level);
        self
    }

    /// The config's port was overridden on the command line.
    pub fn port_override(mut self) -> Self {
        self.port_override = true;
        self
    }

    pub async fn build(self) -> Gateway {
        let loader = RouteLoader::new(self.discovery, Arc::new(ProxyCache::new()));
        let routes = loader.load(&self.config).await;
        let config = ConfigHandle::new(self.config, routes);

        let mut coordinator = ReloadCoordinator::new(self.config_path, config.clone(), loader);
        if let Some(log_level) = self.log_level {
            coordinator = coordinator.with_log_level(log_level);
        }
        if self.port_override {
            coordinator = coordinator.with_port_override();
        }
        let server = GatewayServer::new(config.clone());

        Gateway {
            config,
            coordinator: Arc::new(coordinator),
            server,
        }
    }
}

impl Gateway {
    /// Serve on `listener` until `shutdown` is triggered.
    ///
    /// Starts the config file watcher and the discovery refresh task; both stop
    /// with the server.
    pub async fn run(self, listener: TcpListener, shutdown: Arc<Shutdown>) -> io::Result<()> {
        let (watcher, changes) = ConfigWatcher::new(self.coordinator.path());
        let _watcher = match watcher.run() {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                tracing::warn!(error = %err, "Config watcher unavailable, hot reload disabled");
                None
            }
        };

        let watch_task = Arc::clone(&self.coordinator).spawn_watch(changes, shutdown.subscribe());
        let refresh_task = Arc::clone(&self.coordinator).spawn_refresh(shutdown.subscribe());

        let result = self.server.run(listener, shutdown.subscribe()).await;

        shutdown.trigger();
        let _ = tokio::join!(watch_task, refresh_task);
        result
    }
}

/// Map OS signals onto shutdown and reload until shutdown.
pub fn spawn_signal_handler(
    shutdown: Arc<Shutdown>,
    coordinator: Arc<ReloadCoordinator>,
) -> io::Result<JoinHandle<()>> {
    let mut signals = Signals::new()?;
    Ok(tokio::spawn(async move {
        loop {
            match signals.recv().await {
                Signal::Hangup => {
                    tracing::info!("SIGHUP received, reloading configuration");
                    let _ = coordinator.reload().await;
                }
                signal => {
                    tracing::info!(signal = ?signal, "Termination signal received");
                    shutdown.trigger();
                    break;
                }
            }
        }
    }))
}
