//! Outgoing edges and the pluggable store that holds them.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::value::{Fields, PropValue, Record};
use crate::location::NodeLocation;

/// A directed, payload-bearing connection to a target location.
///
/// Edges are owned by their source node's store and refer to their target
/// by value, never by live handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Location of the node the edge points at.
    pub target: NodeLocation,
    /// Read-only payload inspected by pattern guards.
    pub payload: Record,
}

impl Edge {
    /// Creates an edge.
    pub fn new(target: NodeLocation, payload: Record) -> Self {
        Self { target, payload }
    }
}

impl Fields for Edge {
    fn field(&self, name: &str) -> Option<PropValue> {
        self.payload.field(name)
    }
}

/// Immutable view of a node's edges taken when iteration starts.
pub type EdgeSnapshot = Arc<Vec<Edge>>;

/// Storage backend for one node's outgoing edges.
///
/// Appends may interleave with traversals; readers always observe the
/// collection as it was when [`EdgeStore::snapshot`] returned.
pub trait EdgeStore: Send + Sync {
    /// Current edges in insertion order.
    fn snapshot(&self) -> EdgeSnapshot;

    /// Appends an edge from `source` to `target`.
    fn append(&self, source: &NodeLocation, target: NodeLocation, payload: Record) -> Result<()>;

    /// Number of stored edges.
    fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns `true` when no edges are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens the edge store for a newly created node.
pub trait EdgeStoreFactory: Send + Sync {
    /// Returns the store backing `node`.
    fn open(&self, node: &NodeLocation) -> Result<Arc<dyn EdgeStore>>;
}

/// Copy-on-write in-memory edge list.
#[derive(Default)]
pub struct MemoryEdgeStore {
    edges: RwLock<EdgeSnapshot>,
}

impl MemoryEdgeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EdgeStore for MemoryEdgeStore {
    fn snapshot(&self) -> EdgeSnapshot {
        Arc::clone(&self.edges.read())
    }

    fn append(&self, _source: &NodeLocation, target: NodeLocation, payload: Record) -> Result<()> {
        let mut guard = self.edges.write();
        // Outstanding snapshots keep the old vector; make_mut clones only then.
        Arc::make_mut(&mut guard).push(Edge::new(target, payload));
        Ok(())
    }

    fn len(&self) -> usize {
        self.edges.read().len()
    }
}

/// Factory handing every node its own [`MemoryEdgeStore`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryEdgeStores;

impl EdgeStoreFactory for MemoryEdgeStores {
    fn open(&self, _node: &NodeLocation) -> Result<Arc<dyn EdgeStore>> {
        Ok(Arc::new(MemoryEdgeStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_stable_across_appends() {
        let store = MemoryEdgeStore::new();
        let source = NodeLocation::new("S", "c", "a");
        store
            .append(&source, NodeLocation::new("S", "c", "b"), Record::new())
            .unwrap();
        let before = store.snapshot();
        store
            .append(&source, NodeLocation::new("S", "c", "d"), Record::new().with("w", 1i64))
            .unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(store.len(), 2);
        let after = store.snapshot();
        assert_eq!(after[1].target.node(), "d");
        assert_eq!(after[1].field("w"), Some(PropValue::Int(1)));
    }
}
