//! TOML description of a network of services.
//!
//! ```toml
//! [[service]]
//! name = "S1"
//!
//! [[service.client]]
//! name = "c"
//! nodes = ["A", "B"]
//!
//! [[edge]]
//! from = "S1.c.A"
//! to = "S1.c.B"
//! payload = { w = 5 }
//! ```
//!
//! Edge targets may name nodes that do not exist; traversals prune such
//! branches. Edge sources must exist.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::graph::service::Service;
use crate::graph::value::{PropValue, Record};
use crate::location::NodeLocation;
use crate::matching::JsonPatternCompiler;
use crate::metrics::{default_metrics, TraversalMetrics};
use crate::net::connection::SessionCache;
use crate::net::loopback::LoopbackNetwork;

/// A whole network: services with their clients and nodes, plus edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Topology {
    /// Services, each with its clients.
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceSpec>,
    /// Edges between nodes.
    #[serde(default, rename = "edge")]
    pub edges: Vec<EdgeSpec>,
}

/// One `[[service]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSpec {
    /// Service name.
    pub name: String,
    /// Hosted clients.
    #[serde(default, rename = "client")]
    pub clients: Vec<ClientSpec>,
}

/// One `[[service.client]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientSpec {
    /// Client name.
    pub name: String,
    /// Node names.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// One `[[edge]]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    /// Source node, `service.client.node`.
    pub from: String,
    /// Target node, `service.client.node`.
    pub to: String,
    /// Edge payload.
    #[serde(default)]
    pub payload: toml::Table,
}

/// Counts reported by `skein check`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TopologySummary {
    /// Number of services.
    pub services: usize,
    /// Number of clients across all services.
    pub clients: usize,
    /// Number of nodes across all clients.
    pub nodes: usize,
    /// Number of edges.
    pub edges: usize,
    /// Edges whose target is not declared.
    pub dangling_edges: usize,
}

impl Topology {
    /// Parses a TOML document and checks it for consistency.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let topology: Self =
            toml::from_str(contents).map_err(|err| GraphError::Config(err.to_string()))?;
        topology.summary()?;
        Ok(topology)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|err| GraphError::Config(format!("{}: {err}", path.display())))
    }

    /// Validates the topology and counts its parts.
    pub fn summary(&self) -> Result<TopologySummary> {
        let mut declared = FxHashSet::default();
        let mut services = FxHashSet::default();
        let mut summary = TopologySummary::default();
        for service in &self.services {
            if !services.insert(service.name.as_str()) {
                return Err(GraphError::InvalidArgument(format!(
                    "service '{}' is declared twice",
                    service.name
                )));
            }
            summary.services += 1;
            for client in &service.clients {
                summary.clients += 1;
                for node in &client.nodes {
                    let location = NodeLocation::new(&service.name, &client.name, node);
                    if declared.insert(location) {
                        summary.nodes += 1;
                    }
                }
            }
        }
        for edge in &self.edges {
            let (from, to) = edge.endpoints()?;
            if !declared.contains(&from) {
                return Err(GraphError::InvalidArgument(format!(
                    "edge source {from} is not a declared node"
                )));
            }
            if !declared.contains(&to) {
                summary.dangling_edges += 1;
            }
            summary.edges += 1;
        }
        Ok(summary)
    }

    /// Builds a loopback network with one session cache per service.
    pub fn build(&self, config: &GraphConfig) -> Result<Arc<LoopbackNetwork>> {
        self.build_with_metrics(config, default_metrics())
    }

    /// Like [`Topology::build`], reporting to `metrics`.
    pub fn build_with_metrics(
        &self,
        config: &GraphConfig,
        metrics: Arc<dyn TraversalMetrics>,
    ) -> Result<Arc<LoopbackNetwork>> {
        let summary = self.summary()?;
        let network = LoopbackNetwork::new();
        for spec in &self.services {
            let sessions = SessionCache::new(network.transport(), config.session_cache_capacity)
                .with_metrics(Arc::clone(&metrics));
            let service = Service::builder(spec.name.clone())
                .connections(Arc::new(sessions))
                .compiler(Arc::new(JsonPatternCompiler))
                .config(config.clone())
                .metrics(Arc::clone(&metrics))
                .build();
            for client_spec in &spec.clients {
                let client = service.add_client(&client_spec.name);
                for node in &client_spec.nodes {
                    client.add_node(node)?;
                }
            }
            network.register(service);
        }
        for edge in &self.edges {
            let (from, to) = edge.endpoints()?;
            let payload = record_from_toml(&edge.payload)?;
            network
                .service(from.service())?
                .node(&from)?
                .add_edge(to, payload)?;
        }
        info!(
            services = summary.services,
            nodes = summary.nodes,
            edges = summary.edges,
            "topology.built"
        );
        Ok(network)
    }
}

impl EdgeSpec {
    fn endpoints(&self) -> Result<(NodeLocation, NodeLocation)> {
        Ok((self.from.parse()?, self.to.parse()?))
    }
}

fn record_from_toml(table: &toml::Table) -> Result<Record> {
    table
        .iter()
        .map(|(key, value)| Ok((key.clone(), value_from_toml(value)?)))
        .collect::<Result<Vec<(String, PropValue)>>>()
        .map(|fields| fields.into_iter().collect())
}

fn value_from_toml(value: &toml::Value) -> Result<PropValue> {
    Ok(match value {
        toml::Value::String(s) => PropValue::String(s.clone()),
        toml::Value::Integer(i) => PropValue::Int(*i),
        toml::Value::Float(f) => PropValue::Float(*f),
        toml::Value::Boolean(b) => PropValue::Bool(*b),
        toml::Value::Datetime(dt) => PropValue::String(dt.to_string()),
        toml::Value::Table(table) => PropValue::Record(record_from_toml(table)?),
        toml::Value::Array(_) => {
            return Err(GraphError::InvalidArgument(
                "arrays are not supported in edge payloads".into(),
            ))
        }
    })
}
