//! Route lookup.
//!
//! # Responsibilities
//! - Store resolved routes keyed by path
//! - Look up the route for a request path
//!
//! # Design Decisions
//! - Immutable after construction; replaced wholesale on reload
//! - Exact paths win, then the longest "/*" prefix
//! - Duplicate paths: first declaration wins

use std::collections::HashMap;
use std::sync::Arc;

use crate::proxy::ProxyHandler;
use crate::routing::descriptor::RouteDescriptor;

/// A route whose target has been resolved and bound to a forwarding handler.
#[derive(Debug)]
pub struct Route {
    pub descriptor: RouteDescriptor,
    pub target_url: String,
    pub proxy: Arc<ProxyHandler>,
}

#[derive(Debug, Default)]
pub struct RouteTable {
    exact: HashMap<String, Arc<Route>>,
    /// (prefix, route), longest prefix first.
    prefixes: Vec<(String, Arc<Route>)>,
}

impl RouteTable {
    /// Build a table from resolved routes. Pure, no I/O.
    pub fn build(routes: impl IntoIterator<Item = Route>) -> Self {
        let mut exact: HashMap<String, Arc<Route>> = HashMap::new();
        let mut prefixes: Vec<(String, Arc<Route>)> = Vec::new();

        for route in routes {
            let path = route.descriptor.path.clone();
            if let Some(prefix) = path.strip_suffix('*') {
                if prefixes.iter().any(|(p, _)| p == prefix) {
                    tracing::warn!(path = %path, "Duplicate route ignored");
                    continue;
                }
                prefixes.push((prefix.to_string(), Arc::new(route)));
            } else if exact.contains_key(&path) {
                tracing::warn!(path = %path, "Duplicate route ignored");
            } else {
                exact.insert(path, Arc::new(route));
            }
        }

        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { exact, prefixes }
    }

    /// Route serving `path`, if any.
    pub fn lookup(&self, path: &str) -> Option<Arc<Route>> {
        if let Some(route) = self.exact.get(path) {
            return Some(Arc::clone(route));
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| {
                path.starts_with(prefix.as_str())
                    || (prefix.len() > 1 && path == prefix.trim_end_matches('/'))
            })
            .map(|(_, route)| Arc::clone(route))
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .exact
            .keys()
            .cloned()
            .chain(self.prefixes.iter().map(|(p, _)| format!("{p}*")))
            .collect();
        paths.sort();
        paths
    }
}
