//! In-process network in which every cross-service call goes through the
//! wire codec.
//!
//! Services registered on a [`LoopbackNetwork`] reach each other through
//! [`LoopbackTransport`]. Each call is encoded as an [`Envelope`], decoded on
//! the receiving side, executed against the local [`Service`], and its
//! `Result` is encoded back. Nothing is shared by reference across the
//! boundary. A service can be taken offline to simulate an unreachable
//! peer, and every delivered call is logged with the sender the receiver
//! decoded.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

use crate::error::{GraphError, Result};
use crate::graph::edge::Edge;
use crate::graph::handle::{
    ClientHandle, ClientRef, NodeHandle, NodeRef, ServiceHandle, ServiceRef,
};
use crate::graph::service::Service;
use crate::graph::value::{PropValue, Record};
use crate::location::{ClientLocation, NodeLocation};
use crate::matching::{Matcher, ResultSet};
use crate::net::connection::Transport;
use crate::net::wire::{self, Envelope, WireError};

/// One call as seen by the receiving service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Receiving service.
    pub service: String,
    /// Operation name, e.g. `node.traverse`.
    pub operation: &'static str,
    /// Sender decoded from the envelope.
    pub sender: ClientLocation,
}

/// Registry of services reachable from each other.
#[derive(Default)]
pub struct LoopbackNetwork {
    services: RwLock<FxHashMap<String, Arc<Service>>>,
    offline: RwLock<FxHashSet<String>>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl LoopbackNetwork {
    /// Creates an empty network.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A transport reaching the services on this network.
    pub fn transport(self: &Arc<Self>) -> LoopbackTransport {
        LoopbackTransport {
            network: Arc::downgrade(self),
        }
    }

    /// Makes `service` reachable under its name.
    pub fn register(&self, service: Arc<Service>) {
        self.services
            .write()
            .insert(service.name().to_owned(), service);
    }

    /// The local object behind `name`.
    pub fn service(&self, name: &str) -> Result<Arc<Service>> {
        self.services
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::not_found("service", name))
    }

    /// Names of registered services, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Takes `name` off the network or brings it back.
    pub fn set_online(&self, name: &str, online: bool) {
        let mut offline = self.offline.write();
        if online {
            offline.remove(name);
        } else {
            offline.insert(name.to_owned());
        }
    }

    /// Returns `true` unless `name` was taken offline.
    pub fn is_online(&self, name: &str) -> bool {
        !self.offline.read().contains(name)
    }

    /// Calls delivered so far, oldest first.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// Forgets recorded deliveries.
    pub fn clear_deliveries(&self) {
        self.deliveries.lock().clear();
    }

    fn dispatch<Out, In, Resp>(
        &self,
        service: &str,
        operation: &'static str,
        sender: &ClientLocation,
        request: &Out,
        handler: impl FnOnce(&Service, &ClientLocation, In) -> Result<Resp>,
    ) -> Result<Resp>
    where
        Out: Serialize + ?Sized,
        In: DeserializeOwned,
        Resp: Serialize + DeserializeOwned,
    {
        let frame = wire::encode(&Envelope {
            sender: sender.clone(),
            body: request,
        })?;
        if !self.is_online(service) {
            return Err(GraphError::connection(service, "service is offline"));
        }
        let target = self
            .services
            .read()
            .get(service)
            .cloned()
            .ok_or_else(|| GraphError::connection(service, "no such service on the network"))?;

        let envelope: Envelope<In> = wire::decode(&frame)?;
        trace!(service, operation, sender = %envelope.sender, "loopback.deliver");
        self.deliveries.lock().push(Delivery {
            service: service.to_owned(),
            operation,
            sender: envelope.sender.clone(),
        });

        let reply: std::result::Result<Resp, WireError> =
            handler(&*target, &envelope.sender, envelope.body).map_err(WireError::from);
        let frame = wire::encode(&reply)?;
        let reply: std::result::Result<Resp, WireError> = wire::decode(&frame)?;
        reply.map_err(GraphError::from)
    }
}

/// [`Transport`] over a [`LoopbackNetwork`].
#[derive(Clone)]
pub struct LoopbackTransport {
    network: Weak<LoopbackNetwork>,
}

impl Transport for LoopbackTransport {
    fn open(&self, source: &ClientLocation, target_service: &str) -> Result<ServiceRef> {
        let network = upgrade(&self.network, target_service)?;
        network.dispatch(target_service, "service.handshake", source, &(), |svc, _, ()| {
            Ok(svc.name().to_owned())
        })?;
        Ok(Arc::new(RemoteService {
            network: self.network.clone(),
            name: target_service.to_owned(),
        }))
    }
}

fn upgrade(network: &Weak<LoopbackNetwork>, service: &str) -> Result<Arc<LoopbackNetwork>> {
    network
        .upgrade()
        .ok_or_else(|| GraphError::connection(service, "network has shut down"))
}

struct RemoteService {
    network: Weak<LoopbackNetwork>,
    name: String,
}

impl ServiceHandle for RemoteService {
    fn service_name(&self) -> &str {
        &self.name
    }

    fn ping(&self, sender: &ClientLocation) -> Result<String> {
        upgrade(&self.network, &self.name)?.dispatch(
            &self.name,
            "service.ping",
            sender,
            &(),
            |svc, sender, ()| ServiceHandle::ping(svc, sender),
        )
    }

    fn lookup_client(&self, sender: &ClientLocation, name: &str) -> Result<ClientRef> {
        upgrade(&self.network, &self.name)?.dispatch(
            &self.name,
            "service.lookup_client",
            sender,
            name,
            |svc, sender, name: String| svc.lookup_client(sender, &name).map(|_| ()),
        )?;
        Ok(Arc::new(RemoteClient {
            network: self.network.clone(),
            location: ClientLocation::new(self.name.clone(), name),
        }))
    }

    fn create_client(&self, sender: &ClientLocation, name: &str) -> Result<()> {
        upgrade(&self.network, &self.name)?.dispatch(
            &self.name,
            "service.create_client",
            sender,
            name,
            |svc, sender, name: String| svc.create_client(sender, &name),
        )
    }
}

struct RemoteClient {
    network: Weak<LoopbackNetwork>,
    location: ClientLocation,
}

impl RemoteClient {
    fn call<Out, In, Resp>(
        &self,
        operation: &'static str,
        sender: &ClientLocation,
        request: &Out,
        handler: impl FnOnce(&dyn ClientHandle, &ClientLocation, In) -> Result<Resp>,
    ) -> Result<Resp>
    where
        Out: Serialize + ?Sized,
        In: DeserializeOwned,
        Resp: Serialize + DeserializeOwned,
    {
        let service = self.location.service();
        upgrade(&self.network, service)?.dispatch(
            service,
            operation,
            sender,
            &(self.location.client(), request),
            |svc, sender, (client, request): (String, In)| {
                let client: ClientRef = svc.client(&client)?;
                handler(&*client, sender, request)
            },
        )
    }
}

impl ClientHandle for RemoteClient {
    fn client_location(&self) -> &ClientLocation {
        &self.location
    }

    fn ping(&self, sender: &ClientLocation) -> Result<String> {
        self.call("client.ping", sender, &(), |client, sender, ()| client.ping(sender))
    }

    fn lookup_node(&self, sender: &ClientLocation, name: &str) -> Result<NodeRef> {
        self.call(
            "client.lookup_node",
            sender,
            name,
            |client, sender, name: String| client.lookup_node(sender, &name).map(|_| ()),
        )?;
        Ok(Arc::new(RemoteNode {
            network: self.network.clone(),
            location: self.location.node(name),
        }))
    }

    fn create_node(&self, sender: &ClientLocation, name: &str) -> Result<()> {
        self.call(
            "client.create_node",
            sender,
            name,
            |client, sender, name: String| client.create_node(sender, &name),
        )
    }

    fn connect(&self, sender: &ClientLocation, target_service: &str) -> Result<ServiceRef> {
        self.call(
            "client.connect",
            sender,
            target_service,
            |client, sender, target: String| client.connect(sender, &target).map(|_| ()),
        )?;
        Ok(Arc::new(RemoteService {
            network: self.network.clone(),
            name: target_service.to_owned(),
        }))
    }
}

struct RemoteNode {
    network: Weak<LoopbackNetwork>,
    location: NodeLocation,
}

impl RemoteNode {
    fn call<Out, In, Resp>(
        &self,
        operation: &'static str,
        sender: &ClientLocation,
        request: &Out,
        handler: impl FnOnce(&dyn NodeHandle, &ClientLocation, In) -> Result<Resp>,
    ) -> Result<Resp>
    where
        Out: Serialize + ?Sized,
        In: DeserializeOwned,
        Resp: Serialize + DeserializeOwned,
    {
        let service = self.location.service();
        upgrade(&self.network, service)?.dispatch(
            service,
            operation,
            sender,
            &(&self.location, request),
            |svc, sender, (location, request): (NodeLocation, In)| {
                let node: NodeRef = svc.node(&location)?;
                handler(&*node, sender, request)
            },
        )
    }
}

impl NodeHandle for RemoteNode {
    fn node_location(&self) -> &NodeLocation {
        &self.location
    }

    fn ping(&self, sender: &ClientLocation) -> Result<String> {
        self.call("node.ping", sender, &(), |node, sender, ()| node.ping(sender))
    }

    fn outgoing_edges(&self, sender: &ClientLocation) -> Result<Vec<Edge>> {
        self.call("node.outgoing_edges", sender, &(), |node, sender, ()| {
            node.outgoing_edges(sender)
        })
    }

    fn add_outgoing_edge(
        &self,
        sender: &ClientLocation,
        target: NodeLocation,
        payload: Record,
    ) -> Result<()> {
        self.call(
            "node.add_outgoing_edge",
            sender,
            &(target, payload),
            |node, sender, (target, payload): (NodeLocation, Record)| {
                node.add_outgoing_edge(sender, target, payload)
            },
        )
    }

    fn traverse(&self, sender: &ClientLocation, matcher: &Matcher) -> Result<ResultSet> {
        self.call(
            "node.traverse",
            sender,
            matcher,
            |node, sender, matcher: Matcher| node.traverse(sender, &matcher),
        )
    }

    fn add_task(&self, sender: &ClientLocation, name: &str, kind: &str) -> Result<()> {
        self.call(
            "node.add_task",
            sender,
            &(name.to_owned(), kind.to_owned()),
            |node, sender, (name, kind): (String, String)| node.add_task(sender, &name, &kind),
        )
    }

    fn call_task(&self, sender: &ClientLocation, name: &str, params: &[PropValue]) -> Result<()> {
        self.call(
            "node.call_task",
            sender,
            &(name.to_owned(), params.to_vec()),
            |node, sender, (name, params): (String, Vec<PropValue>)| {
                node.call_task(sender, &name, &params)
            },
        )
    }
}
