//! Hot-reload coordination.
//!
//! A reload parses the file first, builds the route table for the parsed
//! config, and only then publishes both with one swap. A parse failure leaves
//! the running generation untouched. Reloads from the watcher, SIGHUP and the
//! periodic discovery refresh are serialized by one async mutex.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::handle::ConfigHandle;
use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;
use crate::error::GatewayError;
use crate::observability::{metrics, LogLevelHandle};
use crate::routing::RouteLoader;

/// Bursts of file events within this window collapse into one reload.
const DEBOUNCE: Duration = Duration::from_millis(200);

/// Re-check period while periodic refresh is disabled.
const IDLE_REFRESH_CHECK: Duration = Duration::from_secs(30);

pub struct ReloadCoordinator {
    path: PathBuf,
    handle: ConfigHandle,
    loader: RouteLoader,
    log_level: Option<LogLevelHandle>,
    port_override: bool,
    serial: Mutex<()>,
}

/// Port a reloaded config keeps, and whether the file asked for another one.
///
/// With a command-line override the file's port is never in effect, so a
/// difference is not a requested change.
fn pin_port(listening: u16, requested: u16, overridden: bool) -> (u16, bool) {
    (listening, !overridden && requested != listening)
}

impl ReloadCoordinator {
    pub fn new(path: impl Into<PathBuf>, handle: ConfigHandle, loader: RouteLoader) -> Self {
        Self {
            path: path.into(),
            handle,
            loader,
            log_level: None,
            port_override: false,
            serial: Mutex::new(()),
        }
    }

    /// Apply `log_level` changes to the installed subscriber.
    pub fn with_log_level(mut self, log_level: LogLevelHandle) -> Self {
        self.log_level = Some(log_level);
        self
    }

    /// The listening port came from the command line, not the file.
    pub fn with_port_override(mut self) -> Self {
        self.port_override = true;
        self
    }

    pub fn handle(&self) -> &ConfigHandle {
        &self.handle
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the config file and publish it. Returns the new generation.
    pub async fn reload(&self) -> Result<u64, GatewayError> {
        let _serial = self.serial.lock().await;

        let next = match load_config(&self.path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(
                    path = ?self.path,
                    error = %err,
                    "Config reload failed, keeping current configuration"
                );
                metrics::record_reload("failure");
                return Err(GatewayError::ConfigParse(err.to_string()));
            }
        };

        let version = self.publish(next).await;
        metrics::record_reload("success");
        Ok(version)
    }

    /// Publish an already parsed config.
    pub async fn apply(&self, config: GatewayConfig) -> u64 {
        let _serial = self.serial.lock().await;
        self.publish(config).await
    }

    /// Rebuild the route table for the current config, picking up discovery
    /// changes. The config itself is not re-read.
    pub async fn refresh_routes(&self) -> u64 {
        let _serial = self.serial.lock().await;
        let current = self.handle.get();
        let routes = self.loader.load(&current).await;
        let version = self.handle.swap(current, routes);
        tracing::debug!(version, "Route table refreshed");
        version
    }

    async fn publish(&self, mut next: GatewayConfig) -> u64 {
        let previous = self.handle.get();

        let (port, changed) = pin_port(previous.port, next.port, self.port_override);
        if changed {
            tracing::warn!(
                current = previous.port,
                requested = next.port,
                "Port changes require a restart, keeping current port"
            );
        }
        next.port = port;

        if next.service_discovery.enabled
            && !previous.service_discovery.enabled
            && !self.loader.has_discovery()
        {
            tracing::warn!(
                discovery_type = %next.service_discovery.discovery_type,
                "Discovery enabled but no backend was built at startup, restart required"
            );
        }
        if next.service_discovery.consul != previous.service_discovery.consul
            || next.service_discovery.discovery_type != previous.service_discovery.discovery_type
        {
            tracing::warn!("Discovery backend changes require a restart");
        }
        if next.log_level != previous.log_level {
            if let Some(log_level) = &self.log_level {
                match log_level.set_level(&next.log_level) {
                    Ok(()) => tracing::info!(level = %next.log_level, "Log level updated"),
                    Err(err) => tracing::warn!(error = %err, "Log level not updated"),
                }
            }
        }

        let routes = self.loader.load(&next).await;
        let route_count = routes.len();
        let version = self.handle.swap(Arc::new(next), routes);
        tracing::info!(version, routes = route_count, "Configuration reloaded");
        version
    }

    /// Reload on every change signal until shutdown.
    pub fn spawn_watch(
        self: Arc<Self>,
        mut changes: mpsc::UnboundedReceiver<()>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    change = changes.recv() => {
                        if change.is_none() {
                            break;
                        }
                        tokio::time::sleep(DEBOUNCE).await;
                        while changes.try_recv().is_ok() {}
                        // Failures are logged inside reload.
                        let _ = self.reload().await;
                    }
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!("Config watch task stopped");
        })
    }

    /// Rebuild routes every `service_discovery.refresh_interval` until shutdown.
    pub fn spawn_refresh(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let config = self.handle.get();
                let settings = &config.service_discovery;
                let active = settings.enabled && !settings.refresh_interval.is_zero();
                let wait = if active {
                    settings.refresh_interval
                } else {
                    IDLE_REFRESH_CHECK
                };

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if active {
                            self.refresh_routes().await;
                        }
                    }
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!("Route refresh task stopped");
        })
    }
}
