//! Graph nodes and the traversal engine.
//!
//! [`Node::traverse`] drives a [`Matcher`] over the live graph. For every
//! outgoing edge it advances the matcher, collects bindings when the new
//! frontier accepts, and recurses into the edge's target when the frontier
//! can continue, resolving the target through the service's locator. The
//! target may live in another service; the recursion is the same either
//! way.
//!
//! Routing failures (`NotFound`, `ConnectionFailure`) met while resolving a
//! target prune that one branch under [`BranchFailure::Prune`]. Anything
//! else, or any failure under [`BranchFailure::Abort`], ends the query.
//!
//! The engine does no cycle detection: an unbounded pattern over a cyclic
//! graph does not terminate.

use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{trace, warn};

use crate::config::BranchFailure;
use crate::error::Result;
use crate::graph::edge::{Edge, EdgeSnapshot, EdgeStore};
use crate::graph::handle::NodeHandle;
use crate::graph::service::Runtime;
use crate::graph::task::TaskContext;
use crate::graph::value::{PropValue, Record};
use crate::location::{ClientLocation, NodeLocation};
use crate::matching::{Matcher, ResultSet};

/// A vertex hosted by a local client.
pub struct Node {
    location: NodeLocation,
    store: Arc<dyn EdgeStore>,
    runtime: Arc<Runtime>,
}

impl Node {
    pub(crate) fn new(location: NodeLocation, store: Arc<dyn EdgeStore>, runtime: Arc<Runtime>) -> Self {
        Self {
            location,
            store,
            runtime,
        }
    }

    /// Location of the node.
    pub fn location(&self) -> &NodeLocation {
        &self.location
    }

    /// Outgoing edges as of now.
    pub fn edges(&self) -> EdgeSnapshot {
        self.store.snapshot()
    }

    /// Appends an outgoing edge.
    pub fn add_edge(&self, target: NodeLocation, payload: Record) -> Result<()> {
        trace!(source = %self.location, target = %target, "node.edge.added");
        self.store.append(&self.location, target, payload)
    }

    /// Runs `matcher` from this node and returns every match.
    ///
    /// `sender` is the client the query originates from; it is forwarded
    /// unchanged to every remote hop.
    pub fn traverse(&self, sender: &ClientLocation, matcher: &Matcher) -> Result<ResultSet> {
        let edges = self.edges();
        let parallel = self
            .runtime
            .config
            .parallel_fanout_threshold
            .is_some_and(|threshold| edges.len() >= threshold);
        trace!(node = %self.location, edges = edges.len(), parallel, "traverse.enter");

        if parallel {
            edges
                .par_iter()
                .map(|edge| self.explore(sender, matcher, edge))
                .try_reduce(ResultSet::empty, |a, b| Ok(a.union(b)))
        } else {
            edges.iter().try_fold(ResultSet::empty(), |acc, edge| {
                Ok(acc.union(self.explore(sender, matcher, edge)?))
            })
        }
    }

    /// Compiles `expression` with the service's compiler and traverses.
    pub fn query(
        &self,
        sender: &ClientLocation,
        expression: &str,
        params: &[PropValue],
    ) -> Result<ResultSet> {
        let matcher = self.runtime.compiler.compile(expression, params)?;
        self.traverse(sender, &matcher)
    }

    /// Binds task `name` to the service's task kind `kind`.
    pub fn register_task(&self, name: &str, kind: &str) -> Result<()> {
        let task = self.runtime.task_kinds.get(kind)?;
        self.runtime.tasks.add_task(&self.location, name, task)
    }

    /// Runs task `name` on behalf of `sender`.
    pub fn run_task(&self, sender: &ClientLocation, name: &str, params: &[PropValue]) -> Result<()> {
        let ctx = TaskContext {
            node: self,
            sender,
            extensions: self.runtime.extensions.as_ref(),
        };
        self.runtime.tasks.call_task(&ctx, name, params)
    }

    fn explore(&self, sender: &ClientLocation, matcher: &Matcher, edge: &Edge) -> Result<ResultSet> {
        self.runtime.metrics.edge_examined();
        let next = matcher.cont(edge)?;
        let mut found = if next.can_take() {
            next.take()?
        } else {
            ResultSet::empty()
        };
        if !next.can_cont() {
            return Ok(found);
        }

        match self.descend(sender, &next, &edge.target) {
            Ok(deeper) => found = found.union(deeper),
            Err(err)
                if err.is_branch_local()
                    && self.runtime.config.branch_failure == BranchFailure::Prune =>
            {
                let reason = if err.is_connection_failure() {
                    "connection"
                } else {
                    "not_found"
                };
                warn!(
                    node = %self.location,
                    target = %edge.target,
                    error = %err,
                    "traverse.branch.pruned"
                );
                self.runtime.metrics.branch_pruned(reason);
            }
            Err(err) => return Err(err),
        }
        Ok(found)
    }

    fn descend(&self, sender: &ClientLocation, matcher: &Matcher, target: &NodeLocation) -> Result<ResultSet> {
        let caller = self.location.client_location();
        let node = self.runtime.locator().locate(&caller, target, sender)?;
        let result = node.traverse(sender, matcher);
        if let Err(err) = &result {
            if err.is_connection_failure() && target.service() != caller.service() {
                self.runtime.connections.invalidate(&caller, target.service());
            }
        }
        result
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("location", &self.location)
            .field("edges", &self.store.len())
            .finish()
    }
}

impl NodeHandle for Node {
    fn node_location(&self) -> &NodeLocation {
        &self.location
    }

    fn ping(&self, _sender: &ClientLocation) -> Result<String> {
        Ok(format!("node {}", self.location))
    }

    fn outgoing_edges(&self, _sender: &ClientLocation) -> Result<Vec<Edge>> {
        Ok(self.edges().to_vec())
    }

    fn add_outgoing_edge(
        &self,
        _sender: &ClientLocation,
        target: NodeLocation,
        payload: Record,
    ) -> Result<()> {
        self.add_edge(target, payload)
    }

    fn traverse(&self, sender: &ClientLocation, matcher: &Matcher) -> Result<ResultSet> {
        Node::traverse(self, sender, matcher)
    }

    fn add_task(&self, _sender: &ClientLocation, name: &str, kind: &str) -> Result<()> {
        self.register_task(name, kind)
    }

    fn call_task(&self, sender: &ClientLocation, name: &str, params: &[PropValue]) -> Result<()> {
        self.run_task(sender, name, params)
    }
}
