//! Route table construction from configuration.
//!
//! Each configured route is compiled, resolved and bound to a cached proxy
//! handler. A route that fails any step is skipped with a log entry; the rest of
//! the table is still built.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::config::schema::{GatewayConfig, RouteConfig};
use crate::discovery::ServiceDiscovery;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::proxy::ProxyCache;
use crate::routing::descriptor::RouteDescriptor;
use crate::routing::resolver::TargetResolver;
use crate::routing::table::{Route, RouteTable};

#[derive(Clone)]
pub struct RouteLoader {
    discovery: Option<Arc<dyn ServiceDiscovery>>,
    proxies: Arc<ProxyCache>,
}

impl RouteLoader {
    pub fn new(discovery: Option<Arc<dyn ServiceDiscovery>>, proxies: Arc<ProxyCache>) -> Self {
        Self { discovery, proxies }
    }

    /// Whether a discovery backend is wired in, enabled or not.
    pub fn has_discovery(&self) -> bool {
        self.discovery.is_some()
    }

    pub fn proxies(&self) -> &Arc<ProxyCache> {
        &self.proxies
    }

    /// Build a route table for `config`.
    pub async fn load(&self, config: &GatewayConfig) -> RouteTable {
        let discovery = self
            .discovery
            .clone()
            .filter(|_| config.service_discovery.enabled);
        let discovery_available = discovery.is_some();
        let resolver = TargetResolver::new(discovery, config.service_discovery.selection);

        let bound = join_all(
            config
                .routes
                .iter()
                .map(|route| self.bind(route, &resolver, discovery_available)),
        )
        .await;

        let routes: Vec<Route> = bound
            .into_iter()
            .zip(&config.routes)
            .filter_map(|(result, route)| match result {
                Ok(route) => Some(route),
                Err(err @ (GatewayError::NoTarget(_) | GatewayError::NoInstances(_))) => {
                    tracing::warn!(path = %route.path, error = %err, "Route skipped");
                    None
                }
                Err(err) => {
                    tracing::error!(path = %route.path, error = %err, "Route skipped");
                    None
                }
            })
            .collect();

        let table = RouteTable::build(routes);
        metrics::record_routes_active(table.len());
        tracing::info!(
            configured = config.routes.len(),
            registered = table.len(),
            "Route table built"
        );
        table
    }

    async fn bind(
        &self,
        route: &RouteConfig,
        resolver: &TargetResolver,
        discovery_available: bool,
    ) -> Result<Route, GatewayError> {
        let descriptor = RouteDescriptor::from_config(route, discovery_available)?;
        let target_url = resolver.resolve(&descriptor).await?;
        let proxy = self.proxies.get_or_create(&target_url)?;

        tracing::info!(
            path = %descriptor.path,
            target_url = %target_url,
            timeout = ?descriptor.timeout,
            "Registered route"
        );

        Ok(Route {
            descriptor,
            target_url,
            proxy,
        })
    }
}
