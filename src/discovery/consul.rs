//! Consul health-API discovery.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::config::schema::ServiceDiscoveryConfig;
use crate::discovery::{DiscoveryError, ServiceDiscovery, ServiceInstance};

/// Queries `/v1/health/service/{name}?passing=true` on a Consul agent.
pub struct ConsulDiscovery {
    address: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    node: NodeEntry,
    service: ServiceEntry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeEntry {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceEntry {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(default)]
    service: String,
    #[serde(default)]
    address: String,
    port: u16,
    #[serde(default)]
    meta: Option<HashMap<String, String>>,
}

impl ConsulDiscovery {
    pub fn new(address: impl Into<String>) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            address: address.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build the configured discovery backend.
    ///
    /// A Consul backend is built even while discovery is disabled so a later
    /// reload can switch it on; the route loader decides whether it is used.
    /// An unknown type is only an error when discovery is enabled.
    pub fn from_config(
        config: &ServiceDiscoveryConfig,
    ) -> Result<Option<Self>, DiscoveryError> {
        if !config.discovery_type.eq_ignore_ascii_case("consul") {
            if config.enabled {
                return Err(DiscoveryError::Unsupported(config.discovery_type.clone()));
            }
            return Ok(None);
        }
        Self::new(config.consul.address.clone()).map(Some)
    }

    async fn fetch(&self, service_name: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
        let url = format!("{}/v1/health/service/{}", self.address, service_name);
        let response = self
            .client
            .get(url)
            .query(&[("passing", "true")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status(response.status().as_u16()));
        }

        let entries: Vec<HealthEntry> = response.json().await?;
        Ok(entries.into_iter().map(into_instance).collect())
    }
}

fn into_instance(entry: HealthEntry) -> ServiceInstance {
    // Services registered without an address run on the node itself.
    let host = if entry.service.address.is_empty() {
        entry.node.address
    } else {
        entry.service.address
    };
    ServiceInstance {
        id: entry.service.id,
        service: entry.service.service,
        host,
        port: entry.service.port,
        metadata: entry.service.meta.unwrap_or_default(),
    }
}

impl ServiceDiscovery for ConsulDiscovery {
    fn get_instances<'a>(
        &'a self,
        service_name: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ServiceInstance>, DiscoveryError>> {
        Box::pin(self.fetch(service_name))
    }
}
