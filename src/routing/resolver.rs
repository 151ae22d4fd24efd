//! Target resolution.
//!
//! Static routes resolve to their configured URL. Service routes query discovery
//! on every call; instances are never cached here.

use std::sync::Arc;

use crate::config::schema::InstanceSelection;
use crate::discovery::{ServiceDiscovery, ServiceInstance};
use crate::error::GatewayError;
use crate::routing::descriptor::{RouteDescriptor, TargetStrategy};

pub struct TargetResolver {
    discovery: Option<Arc<dyn ServiceDiscovery>>,
    selection: InstanceSelection,
}

impl TargetResolver {
    pub fn new(discovery: Option<Arc<dyn ServiceDiscovery>>, selection: InstanceSelection) -> Self {
        Self { discovery, selection }
    }

    /// Concrete target URL for `descriptor`.
    pub async fn resolve(&self, descriptor: &RouteDescriptor) -> Result<String, GatewayError> {
        match &descriptor.target {
            TargetStrategy::Static(url) => Ok(url.clone()),
            TargetStrategy::Service(name) => {
                let discovery = self
                    .discovery
                    .as_ref()
                    .ok_or_else(|| GatewayError::NoTarget(descriptor.path.clone()))?;

                let instances = discovery
                    .get_instances(name)
                    .await
                    .map_err(|source| GatewayError::Discovery {
                        service: name.clone(),
                        source,
                    })?;

                let instance = select(&instances, self.selection)
                    .ok_or_else(|| GatewayError::NoInstances(name.clone()))?;

                let url = instance.base_url();
                tracing::debug!(
                    path = %descriptor.path,
                    service = %name,
                    instance = %instance.id,
                    target_url = %url,
                    "Resolved service instance"
                );
                Ok(url)
            }
        }
    }
}

fn select(instances: &[ServiceInstance], selection: InstanceSelection) -> Option<&ServiceInstance> {
    match selection {
        InstanceSelection::First => instances.first(),
        InstanceSelection::Random if instances.is_empty() => None,
        InstanceSelection::Random => instances.get(fastrand::usize(..instances.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryError;
    use futures_util::future::BoxFuture;
    use std::collections::HashMap;
    use std::time::Duration;

    struct FixedDiscovery(Vec<ServiceInstance>);

    impl ServiceDiscovery for FixedDiscovery {
        fn get_instances<'a>(
            &'a self,
            _service_name: &'a str,
        ) -> BoxFuture<'a, Result<Vec<ServiceInstance>, DiscoveryError>> {
            Box::pin(async move { Ok(self.0.clone()) })
        }
    }

    struct FailingDiscovery;

    impl ServiceDiscovery for FailingDiscovery {
        fn get_instances<'a>(
            &'a self,
            _service_name: &'a str,
        ) -> BoxFuture<'a, Result<Vec<ServiceInstance>, DiscoveryError>> {
            Box::pin(async { Err(DiscoveryError::Status(500)) })
        }
    }

    fn instance(host: &str, port: u16) -> ServiceInstance {
        ServiceInstance {
            id: format!("{host}-{port}"),
            service: "user-service".into(),
            host: host.into(),
            port,
            metadata: HashMap::new(),
        }
    }

    fn service_route() -> RouteDescriptor {
        RouteDescriptor {
            path: "/api/users".into(),
            target: TargetStrategy::Service("user-service".into()),
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn static_target_is_returned_directly() {
        let resolver = TargetResolver::new(None, InstanceSelection::First);
        let descriptor = RouteDescriptor {
            path: "/s".into(),
            target: TargetStrategy::Static("http://127.0.0.1:3000".into()),
            timeout: Duration::from_secs(1),
        };
        assert_eq!(resolver.resolve(&descriptor).await.unwrap(), "http://127.0.0.1:3000");
    }

    #[tokio::test]
    async fn first_instance_is_selected() {
        let discovery = Arc::new(FixedDiscovery(vec![instance("10.0.0.5", 9000), instance("10.0.0.6", 9000)]));
        let resolver = TargetResolver::new(Some(discovery), InstanceSelection::First);
        assert_eq!(resolver.resolve(&service_route()).await.unwrap(), "http://10.0.0.5:9000");
    }

    #[tokio::test]
    async fn random_selection_stays_within_instances() {
        let discovery = Arc::new(FixedDiscovery(vec![instance("10.0.0.5", 9000), instance("10.0.0.6", 9000)]));
        let resolver = TargetResolver::new(Some(discovery), InstanceSelection::Random);
        for _ in 0..20 {
            let url = resolver.resolve(&service_route()).await.unwrap();
            assert!(url == "http://10.0.0.5:9000" || url == "http://10.0.0.6:9000");
        }
    }

    #[tokio::test]
    async fn empty_instance_list_is_an_error() {
        let resolver = TargetResolver::new(Some(Arc::new(FixedDiscovery(vec![]))), InstanceSelection::First);
        assert!(matches!(
            resolver.resolve(&service_route()).await,
            Err(GatewayError::NoInstances(name)) if name == "user-service"
        ));
    }

    #[tokio::test]
    async fn discovery_failure_is_an_error() {
        let resolver = TargetResolver::new(Some(Arc::new(FailingDiscovery)), InstanceSelection::First);
        assert!(matches!(
            resolver.resolve(&service_route()).await,
            Err(GatewayError::Discovery { .. })
        ));
    }
}
