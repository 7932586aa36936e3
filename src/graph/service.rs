//! Local services and clients.
//!
//! A [`Service`] is built once per process partition with a
//! [`ServiceBuilder`] that wires in its collaborators: connection manager,
//! pattern compiler, edge-store factory, task manager, configuration and
//! metrics. Clients and nodes created under the service share those
//! collaborators through a single [`Runtime`].

use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::graph::edge::{EdgeStoreFactory, MemoryEdgeStores};
use crate::graph::handle::{ClientHandle, ClientRef, NodeRef, ServiceHandle, ServiceRef};
use crate::graph::node::Node;
use crate::graph::task::{Extensions, InlineTaskManager, Task, TaskManager, TaskRegistry};
use crate::location::{ClientLocation, NodeLocation};
use crate::matching::{JsonPatternCompiler, PatternCompiler};
use crate::metrics::{default_metrics, TraversalMetrics};
use crate::net::connection::{ConnectionManager, Isolated};
use crate::net::locator::{NodeLocator, Router};

/// Collaborators shared by a service and everything it hosts.
pub(crate) struct Runtime {
    pub(crate) service: String,
    pub(crate) locator: Router,
    pub(crate) connections: Arc<dyn ConnectionManager>,
    pub(crate) compiler: Arc<dyn PatternCompiler>,
    pub(crate) tasks: Arc<dyn TaskManager>,
    pub(crate) task_kinds: TaskRegistry,
    pub(crate) edge_stores: Arc<dyn EdgeStoreFactory>,
    pub(crate) config: GraphConfig,
    pub(crate) metrics: Arc<dyn TraversalMetrics>,
    pub(crate) extensions: Option<Extensions>,
}

impl Runtime {
    pub(crate) fn locator(&self) -> &dyn NodeLocator {
        &self.locator
    }
}

/// Builder for [`Service`].
pub struct ServiceBuilder {
    name: String,
    connections: Arc<dyn ConnectionManager>,
    compiler: Arc<dyn PatternCompiler>,
    tasks: Arc<dyn TaskManager>,
    edge_stores: Arc<dyn EdgeStoreFactory>,
    config: GraphConfig,
    metrics: Arc<dyn TraversalMetrics>,
    extensions: Option<Extensions>,
}

impl ServiceBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            connections: Arc::new(Isolated),
            compiler: Arc::new(JsonPatternCompiler),
            tasks: Arc::new(InlineTaskManager::default()),
            edge_stores: Arc::new(MemoryEdgeStores),
            config: GraphConfig::default(),
            metrics: default_metrics(),
            extensions: None,
        }
    }

    /// Connection manager used to reach other services.
    pub fn connections(mut self, connections: Arc<dyn ConnectionManager>) -> Self {
        self.connections = connections;
        self
    }

    /// Compiler used by [`Node::query`].
    pub fn compiler(mut self, compiler: Arc<dyn PatternCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Task manager running node tasks.
    pub fn task_manager(mut self, tasks: Arc<dyn TaskManager>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Factory for per-node edge stores.
    pub fn edge_stores(mut self, edge_stores: Arc<dyn EdgeStoreFactory>) -> Self {
        self.edge_stores = edge_stores;
        self
    }

    /// Engine configuration.
    pub fn config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    /// Metrics sink.
    pub fn metrics(mut self, metrics: Arc<dyn TraversalMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Capabilities handed to every task run on this service.
    pub fn extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Builds the service.
    pub fn build(self) -> Arc<Service> {
        Arc::new_cyclic(|weak: &Weak<Service>| {
            let locator = Router::new(
                weak.clone(),
                Arc::clone(&self.connections),
                Arc::clone(&self.metrics),
            );
            Service {
                runtime: Arc::new(Runtime {
                    service: self.name,
                    locator,
                    connections: self.connections,
                    compiler: self.compiler,
                    tasks: self.tasks,
                    task_kinds: TaskRegistry::default(),
                    edge_stores: self.edge_stores,
                    config: self.config,
                    metrics: self.metrics,
                    extensions: self.extensions,
                }),
                clients: RwLock::new(FxHashMap::default()),
            }
        })
    }
}

/// A network-addressable partition of the graph.
pub struct Service {
    runtime: Arc<Runtime>,
    clients: RwLock<FxHashMap<String, Arc<Client>>>,
}

impl Service {
    /// Starts building a service called `name`.
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder::new(name.into())
    }

    /// Service name.
    pub fn name(&self) -> &str {
        &self.runtime.service
    }

    /// Engine configuration in effect.
    pub fn config(&self) -> &GraphConfig {
        &self.runtime.config
    }

    /// Client `name`, or `NotFound`.
    pub fn client(&self, name: &str) -> Result<Arc<Client>> {
        self.clients
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::not_found("client", format!("{}.{name}", self.name())))
    }

    /// Returns client `name`, creating it first if needed.
    pub fn add_client(&self, name: &str) -> Arc<Client> {
        let mut clients = self.clients.write();
        let client = clients.entry(name.to_owned()).or_insert_with(|| {
            debug!(service = %self.runtime.service, client = name, "service.client.created");
            Arc::new(Client {
                location: ClientLocation::new(self.runtime.service.clone(), name),
                runtime: Arc::clone(&self.runtime),
                nodes: RwLock::new(FxHashMap::default()),
            })
        });
        Arc::clone(client)
    }

    /// Names of all clients, sorted.
    pub fn client_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clients.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Node at `location`, which must belong to this service.
    pub fn node(&self, location: &NodeLocation) -> Result<Arc<Node>> {
        if location.service() != self.name() {
            return Err(GraphError::InvalidArgument(format!(
                "{location} is not hosted by service '{}'",
                self.name()
            )));
        }
        self.client(location.client())?.node(location.node())
    }

    /// Registers a task kind nodes can bind with `add_task`.
    pub fn register_task_kind(&self, kind: impl Into<String>, task: Arc<dyn Task>) {
        self.runtime.task_kinds.register(kind, task);
    }
}

impl ServiceHandle for Service {
    fn service_name(&self) -> &str {
        self.name()
    }

    fn ping(&self, _sender: &ClientLocation) -> Result<String> {
        Ok(format!("service {}", self.name()))
    }

    fn lookup_client(&self, _sender: &ClientLocation, name: &str) -> Result<ClientRef> {
        let client: ClientRef = self.client(name)?;
        Ok(client)
    }

    fn create_client(&self, _sender: &ClientLocation, name: &str) -> Result<()> {
        self.add_client(name);
        Ok(())
    }
}

/// A named partition within a service, hosting nodes.
pub struct Client {
    location: ClientLocation,
    runtime: Arc<Runtime>,
    nodes: RwLock<FxHashMap<String, Arc<Node>>>,
}

impl Client {
    /// Location of the client.
    pub fn location(&self) -> &ClientLocation {
        &self.location
    }

    /// Node `name`, or `NotFound`.
    pub fn node(&self, name: &str) -> Result<Arc<Node>> {
        self.nodes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::not_found("node", self.location.node(name).to_string()))
    }

    /// Returns node `name`, creating it and opening its edge store if needed.
    pub fn add_node(&self, name: &str) -> Result<Arc<Node>> {
        let mut nodes = self.nodes.write();
        if let Some(node) = nodes.get(name) {
            return Ok(Arc::clone(node));
        }
        let location = self.location.node(name);
        let store = self.runtime.edge_stores.open(&location)?;
        debug!(node = %location, "client.node.created");
        let node = Arc::new(Node::new(location, store, Arc::clone(&self.runtime)));
        nodes.insert(name.to_owned(), Arc::clone(&node));
        Ok(node)
    }

    /// Names of all nodes, sorted.
    pub fn node_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Handle to `target_service`, connected as this client.
    pub fn connect(&self, target_service: &str) -> Result<ServiceRef> {
        self.runtime.connections.connect(&self.location, target_service)
    }
}

impl ClientHandle for Client {
    fn client_location(&self) -> &ClientLocation {
        &self.location
    }

    fn ping(&self, _sender: &ClientLocation) -> Result<String> {
        Ok(format!("client {}", self.location))
    }

    fn lookup_node(&self, _sender: &ClientLocation, name: &str) -> Result<NodeRef> {
        let node: NodeRef = self.node(name)?;
        Ok(node)
    }

    fn create_node(&self, _sender: &ClientLocation, name: &str) -> Result<()> {
        self.add_node(name).map(|_| ())
    }

    fn connect(&self, _sender: &ClientLocation, target_service: &str) -> Result<ServiceRef> {
        Client::connect(self, target_service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_is_get_or_create() -> Result<()> {
        let service = Service::builder("S1").build();
        let first = service.add_client("c");
        let again = service.add_client("c");
        assert!(Arc::ptr_eq(&first, &again));

        let a = first.add_node("a")?;
        assert!(Arc::ptr_eq(&a, &first.add_node("a")?));
        assert_eq!(a.location(), &NodeLocation::new("S1", "c", "a"));
        assert_eq!(service.client_names(), vec!["c".to_string()]);
        Ok(())
    }

    #[test]
    fn unknown_names_are_not_found() {
        let service = Service::builder("S1").build();
        let err = service.client("ghost").err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("client 'S1.ghost' not found"));

        let client = service.add_client("c");
        let missing = client.node("x").err();
        assert!(matches!(missing, Some(GraphError::NotFound { kind: "node", .. })));
    }

    #[test]
    fn isolated_service_cannot_connect() {
        let service = Service::builder("S1").build();
        let client = service.add_client("c");
        assert!(client.connect("S2").err().is_some_and(|e| e.is_connection_failure()));
    }
}
