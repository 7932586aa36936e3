//! Addressing: where a node lives and who is calling.
//!
//! A [`NodeLocation`] is the `(service, client, node)` triple that names a
//! node anywhere in the network; it is the only way one node refers to
//! another. A [`ClientLocation`] is the `(service, client)` pair carried on
//! every cross-boundary call to identify the caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Identifies a caller: a client hosted by a service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientLocation {
    service: String,
    client: String,
}

impl ClientLocation {
    /// Creates a client location.
    pub fn new(service: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            client: client.into(),
        }
    }

    /// Service name, unique across the network.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Client name, unique within its service.
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Location of the node `name` hosted by this client.
    pub fn node(&self, name: impl Into<String>) -> NodeLocation {
        NodeLocation::new(self.service.clone(), self.client.clone(), name)
    }
}

impl fmt::Display for ClientLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service, self.client)
    }
}

impl FromStr for ClientLocation {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match split_exact::<2>(s) {
            Some([service, client]) => Ok(Self::new(service, client)),
            None => Err(GraphError::InvalidArgument(format!(
                "client location '{s}' must have the form service.client"
            ))),
        }
    }
}

/// Globally unique address of a node. Immutable; used both as a routing key
/// and as an edge's target reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeLocation {
    service: String,
    client: String,
    node: String,
}

impl NodeLocation {
    /// Creates a node location.
    pub fn new(
        service: impl Into<String>,
        client: impl Into<String>,
        node: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            client: client.into(),
            node: node.into(),
        }
    }

    /// Name of the service hosting the node.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Name of the client hosting the node.
    pub fn client(&self) -> &str {
        &self.client
    }

    /// Name of the node within its client.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// The `(service, client)` pair owning this node.
    pub fn client_location(&self) -> ClientLocation {
        ClientLocation::new(self.service.clone(), self.client.clone())
    }
}

impl fmt::Display for NodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.service, self.client, self.node)
    }
}

impl FromStr for NodeLocation {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        match split_exact::<3>(s) {
            Some([service, client, node]) => Ok(Self::new(service, client, node)),
            None => Err(GraphError::InvalidArgument(format!(
                "node location '{s}' must have the form service.client.node"
            ))),
        }
    }
}

fn split_exact<const N: usize>(s: &str) -> Option<[&str; N]> {
    let mut parts = [""; N];
    let mut iter = s.split('.');
    for slot in parts.iter_mut() {
        let part = iter.next()?;
        if part.is_empty() {
            return None;
        }
        *slot = part;
    }
    if iter.next().is_some() {
        return None;
    }
    Some(parts)
}
