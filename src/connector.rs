//! Caller-side entry point.
//!
//! A [`GraphClient`] owns a connection manager and a pattern compiler.
//! `connect_as` picks the identity queries are sent under; the returned
//! [`Connector`] resolves start nodes through the connection layer and runs
//! traversals from them.
//!
//! ```rust
//! use std::sync::Arc;
//! use skein::connector::GraphClient;
//! use skein::net::Isolated;
//!
//! let client = GraphClient::new(Arc::new(Isolated));
//! let conn = client.connect_as("S1", "reader");
//! assert!(conn.to("S1").is_err());
//! ```

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::graph::handle::{NodeRef, ServiceRef};
use crate::graph::value::PropValue;
use crate::location::{ClientLocation, NodeLocation};
use crate::matching::{JsonPatternCompiler, Matcher, PatternCompiler, ResultSet};
use crate::net::connection::ConnectionManager;

/// Entry point for issuing queries against a network of services.
#[derive(Clone)]
pub struct GraphClient {
    connections: Arc<dyn ConnectionManager>,
    compiler: Arc<dyn PatternCompiler>,
}

impl GraphClient {
    /// Creates a client using `connections` and the JSON pattern compiler.
    pub fn new(connections: Arc<dyn ConnectionManager>) -> Self {
        Self {
            connections,
            compiler: Arc::new(JsonPatternCompiler),
        }
    }

    /// Replaces the pattern compiler.
    pub fn with_compiler(mut self, compiler: Arc<dyn PatternCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Acts as client `client` of service `service`.
    pub fn connect_as(&self, service: impl Into<String>, client: impl Into<String>) -> Connector {
        Connector {
            identity: ClientLocation::new(service, client),
            connections: Arc::clone(&self.connections),
            compiler: Arc::clone(&self.compiler),
        }
    }
}

/// Queries issued under one client identity.
#[derive(Clone)]
pub struct Connector {
    identity: ClientLocation,
    connections: Arc<dyn ConnectionManager>,
    compiler: Arc<dyn PatternCompiler>,
}

impl Connector {
    /// The identity every call is tagged with.
    pub fn identity(&self) -> &ClientLocation {
        &self.identity
    }

    /// Handle to `target_service`.
    pub fn to(&self, target_service: &str) -> Result<ServiceRef> {
        self.connections.connect(&self.identity, target_service)
    }

    /// Resolves `location` to a node handle.
    pub fn node(&self, location: &NodeLocation) -> Result<NodeRef> {
        self.to(location.service())?
            .lookup_client(&self.identity, location.client())?
            .lookup_node(&self.identity, location.node())
    }

    /// Traverses from `start`. Failing to resolve `start` fails the query.
    pub fn traverse(&self, start: &NodeLocation, matcher: &Matcher) -> Result<ResultSet> {
        info!(start = %start, sender = %self.identity, "query.start");
        let results = self.node(start)?.traverse(&self.identity, matcher)?;
        info!(
            start = %start,
            results = results.len(),
            distinct = results.distinct_len(),
            "query.done"
        );
        Ok(results)
    }

    /// Compiles `expression` with `params` and traverses from `start`.
    pub fn query(
        &self,
        start: &NodeLocation,
        expression: &str,
        params: &[PropValue],
    ) -> Result<ResultSet> {
        let matcher = self.compiler.compile(expression, params)?;
        self.traverse(start, &matcher)
    }
}
