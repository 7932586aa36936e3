//! Resolving a [`NodeLocation`] to a live node handle.

use std::sync::{Arc, Weak};

use tracing::trace;

use crate::error::{GraphError, Result};
use crate::graph::handle::NodeRef;
use crate::graph::service::Service;
use crate::location::{ClientLocation, NodeLocation};
use crate::metrics::TraversalMetrics;
use crate::net::connection::ConnectionManager;

/// Turns a location into a node handle.
pub trait NodeLocator: Send + Sync {
    /// Resolves `target` on behalf of `caller`, tagging every remote call
    /// with `sender`.
    fn locate(
        &self,
        caller: &ClientLocation,
        target: &NodeLocation,
        sender: &ClientLocation,
    ) -> Result<NodeRef>;
}

/// Default locator: in-process for the caller's own service, through the
/// connection layer for everything else.
pub struct Router {
    local: Weak<Service>,
    connections: Arc<dyn ConnectionManager>,
    metrics: Arc<dyn TraversalMetrics>,
}

impl Router {
    pub(crate) fn new(
        local: Weak<Service>,
        connections: Arc<dyn ConnectionManager>,
        metrics: Arc<dyn TraversalMetrics>,
    ) -> Self {
        Self {
            local,
            connections,
            metrics,
        }
    }

    fn locate_local(&self, target: &NodeLocation) -> Result<NodeRef> {
        let service = self
            .local
            .upgrade()
            .ok_or_else(|| GraphError::IllegalState("local service has been dropped".into()))?;
        let node: NodeRef = service.client(target.client())?.node(target.node())?;
        self.metrics.local_resolution();
        trace!(target = %target, "locator.resolve.local");
        Ok(node)
    }

    fn locate_remote(
        &self,
        caller: &ClientLocation,
        target: &NodeLocation,
        sender: &ClientLocation,
    ) -> Result<NodeRef> {
        let resolved = self
            .connections
            .connect(caller, target.service())
            .and_then(|service| service.lookup_client(sender, target.client()))
            .and_then(|client| client.lookup_node(sender, target.node()));
        match resolved {
            Ok(node) => {
                self.metrics.remote_resolution();
                trace!(target = %target, caller = %caller, "locator.resolve.remote");
                Ok(node)
            }
            Err(err) => {
                if err.is_connection_failure() {
                    self.connections.invalidate(caller, target.service());
                }
                Err(err)
            }
        }
    }
}

impl NodeLocator for Router {
    fn locate(
        &self,
        caller: &ClientLocation,
        target: &NodeLocation,
        sender: &ClientLocation,
    ) -> Result<NodeRef> {
        if target.service() == caller.service() {
            self.locate_local(target)
        } else {
            self.locate_remote(caller, target, sender)
        }
    }
}
