//! Transport-agnostic handles to services, clients and nodes.
//!
//! Local objects and remote proxies implement the same traits, so the
//! locator and the traversal engine never know which side of a process
//! boundary they are talking to. Every method takes the `sender`, the
//! client that originated the request; relays pass it through untouched.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::graph::edge::Edge;
use crate::graph::value::{PropValue, Record};
use crate::location::{ClientLocation, NodeLocation};
use crate::matching::{Matcher, ResultSet};

/// Shared handle to a service.
pub type ServiceRef = Arc<dyn ServiceHandle>;
/// Shared handle to a client.
pub type ClientRef = Arc<dyn ClientHandle>;
/// Shared handle to a node.
pub type NodeRef = Arc<dyn NodeHandle>;

/// A network-addressable partition hosting clients.
pub trait ServiceHandle: Send + Sync {
    /// Service name.
    fn service_name(&self) -> &str;

    /// Liveness probe.
    fn ping(&self, sender: &ClientLocation) -> Result<String>;

    /// Client `name`, or `NotFound`.
    fn lookup_client(&self, sender: &ClientLocation, name: &str) -> Result<ClientRef>;

    /// Creates client `name` if it does not exist yet.
    fn create_client(&self, sender: &ClientLocation, name: &str) -> Result<()>;
}

/// A named partition within a service, hosting nodes.
pub trait ClientHandle: Send + Sync {
    /// Location of the client.
    fn client_location(&self) -> &ClientLocation;

    /// Liveness probe.
    fn ping(&self, sender: &ClientLocation) -> Result<String>;

    /// Node `name`, or `NotFound`.
    fn lookup_node(&self, sender: &ClientLocation, name: &str) -> Result<NodeRef>;

    /// Creates node `name` if it does not exist yet.
    fn create_node(&self, sender: &ClientLocation, name: &str) -> Result<()>;

    /// Handle to `target_service`, connected as this client.
    fn connect(&self, sender: &ClientLocation, target_service: &str) -> Result<ServiceRef>;
}

/// A graph vertex with outgoing edges.
pub trait NodeHandle: Send + Sync {
    /// Location of the node.
    fn node_location(&self) -> &NodeLocation;

    /// Liveness probe.
    fn ping(&self, sender: &ClientLocation) -> Result<String>;

    /// Current outgoing edges.
    fn outgoing_edges(&self, sender: &ClientLocation) -> Result<Vec<Edge>>;

    /// Appends an outgoing edge.
    fn add_outgoing_edge(
        &self,
        sender: &ClientLocation,
        target: NodeLocation,
        payload: Record,
    ) -> Result<()>;

    /// Runs `matcher` from this node.
    fn traverse(&self, sender: &ClientLocation, matcher: &Matcher) -> Result<ResultSet>;

    /// Binds task `name` on this node to a task kind registered with the
    /// hosting service.
    fn add_task(&self, sender: &ClientLocation, name: &str, kind: &str) -> Result<()>;

    /// Invokes task `name` with `params`.
    fn call_task(&self, sender: &ClientLocation, name: &str, params: &[PropValue]) -> Result<()>;
}

impl fmt::Debug for dyn ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceHandle")
            .field(&self.service_name())
            .finish()
    }
}

impl fmt::Debug for dyn ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientHandle({})", self.client_location())
    }
}

impl fmt::Debug for dyn NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({})", self.node_location())
    }
}
