//! Proxy handler cache.
//!
//! At most one [`ProxyHandler`] exists per target URL string. Lookup-or-insert
//! runs under the DashMap shard lock, so concurrent first use of a target
//! converges on a single handler. Entries are never evicted implicitly; a target
//! that disappears from discovery keeps its handler, which then fails at dial time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::error::GatewayError;
use crate::proxy::handler::{HttpClient, ProxyHandler};

#[derive(Debug)]
pub struct ProxyCache {
    client: HttpClient,
    handlers: DashMap<String, Arc<ProxyHandler>>,
    created: AtomicUsize,
}

impl ProxyCache {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self::with_client(client)
    }

    pub fn with_client(client: HttpClient) -> Self {
        Self {
            client,
            handlers: DashMap::new(),
            created: AtomicUsize::new(0),
        }
    }

    /// Return the handler for `target`, creating it on first use.
    pub fn get_or_create(&self, target: &str) -> Result<Arc<ProxyHandler>, GatewayError> {
        if let Some(existing) = self.handlers.get(target) {
            return Ok(Arc::clone(existing.value()));
        }

        match self.handlers.entry(target.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let handler = Arc::new(ProxyHandler::new(target, self.client.clone())?);
                self.created.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(target = %target, "Created proxy handler");
                entry.insert(Arc::clone(&handler));
                Ok(handler)
            }
        }
    }

    /// Drop the handler for `target`. Returns whether one existed.
    pub fn invalidate(&self, target: &str) -> bool {
        self.handlers.remove(target).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Total handlers ever constructed.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl Default for ProxyCache {
    fn default() -> Self {
        Self::new()
    }
}
