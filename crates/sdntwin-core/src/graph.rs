//! TopologyGraph: the canonical in-memory mirror of the network.
//!
//! Nodes and edges live in ordered maps keyed by their stable identities, so
//! iteration order, equality and serialization never depend on the order in
//! which the controller happened to report things.
//!
//! # Invariant
//!
//! Every edge endpoint references a node in the same graph. The checked
//! mutation methods (`insert_edge`, `remove_node`, ...) refuse to break it;
//! the crate-internal `put_*` methods are for builders that have already
//! established it.

use std::collections::BTreeMap;

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use crate::edge::LinkMeta;
use crate::error::CoreError;
use crate::id::{EdgeKey, Endpoint, NodeId};
use crate::node::Node;

/// Canonical topology graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "GraphRepr", try_from = "GraphRepr")]
pub struct TopologyGraph {
    nodes: BTreeMap<NodeId, Node>,
    edges: BTreeMap<EdgeKey, LinkMeta>,
}

impl TopologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&EdgeKey, &LinkMeta)> + '_ {
        self.edges.iter()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, key: &EdgeKey) -> Option<&LinkMeta> {
        self.edges.get(key)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Keys of all edges with an endpoint on `id`.
    pub fn edges_touching<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a EdgeKey> + 'a {
        self.edges.keys().filter(move |key| key.touches(id))
    }

    /// Looks a node up by identity first, then by display label.
    pub fn resolve(&self, name: &str) -> Option<&Node> {
        self.nodes
            .get(&NodeId::from(name))
            .or_else(|| self.nodes.get(&NodeId::host(name)))
            .or_else(|| self.nodes.values().find(|n| n.label == name))
    }

    // -----------------------------------------------------------------------
    // Checked mutations (used by event replay)
    // -----------------------------------------------------------------------

    /// Adds a node that must not already exist.
    pub fn insert_node(&mut self, node: Node) -> Result<(), CoreError> {
        if self.nodes.contains_key(&node.id) {
            return Err(CoreError::DuplicateNode { id: node.id });
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Replaces the attributes of an existing node, returning the old value.
    pub fn replace_node(&mut self, node: Node) -> Result<Node, CoreError> {
        match self.nodes.get_mut(&node.id) {
            Some(slot) => Ok(std::mem::replace(slot, node)),
            None => Err(CoreError::UnknownNode { id: node.id }),
        }
    }

    /// Removes a node with no attached edges.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node, CoreError> {
        if !self.nodes.contains_key(id) {
            return Err(CoreError::UnknownNode { id: id.clone() });
        }
        let attached = self.edges_touching(id).count();
        if attached > 0 {
            return Err(CoreError::NodeInUse {
                id: id.clone(),
                edges: attached,
            });
        }
        self.nodes
            .remove(id)
            .ok_or_else(|| CoreError::UnknownNode { id: id.clone() })
    }

    /// Adds an edge whose endpoints are both present.
    pub fn insert_edge(&mut self, key: EdgeKey, meta: LinkMeta) -> Result<(), CoreError> {
        if self.edges.contains_key(&key) {
            return Err(CoreError::DuplicateEdge { edge: key });
        }
        if let Some(missing) = self.missing_endpoint(&key) {
            return Err(CoreError::DanglingEdge { edge: key, missing });
        }
        self.edges.insert(key, meta);
        Ok(())
    }

    /// Replaces the metadata of an existing edge, returning the old value.
    pub fn replace_edge(&mut self, key: &EdgeKey, meta: LinkMeta) -> Result<LinkMeta, CoreError> {
        match self.edges.get_mut(key) {
            Some(slot) => Ok(std::mem::replace(slot, meta)),
            None => Err(CoreError::UnknownEdge { edge: key.clone() }),
        }
    }

    pub fn remove_edge(&mut self, key: &EdgeKey) -> Result<LinkMeta, CoreError> {
        self.edges
            .remove(key)
            .ok_or_else(|| CoreError::UnknownEdge { edge: key.clone() })
    }

    /// Verifies the no-dangling-edge invariant.
    pub fn check_invariant(&self) -> Result<(), CoreError> {
        for key in self.edges.keys() {
            if let Some(missing) = self.missing_endpoint(key) {
                return Err(CoreError::DanglingEdge {
                    edge: key.clone(),
                    missing,
                });
            }
        }
        Ok(())
    }

    fn missing_endpoint(&self, key: &EdgeKey) -> Option<NodeId> {
        let (a, b) = key.endpoints();
        [a, b]
            .into_iter()
            .find(|end| !self.nodes.contains_key(&end.node))
            .map(|end| end.node.clone())
    }

    // -----------------------------------------------------------------------
    // Unchecked builders (invariant established by the caller)
    // -----------------------------------------------------------------------

    pub(crate) fn put_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub(crate) fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn put_edge(&mut self, key: EdgeKey, meta: LinkMeta) {
        debug_assert!(self.missing_endpoint(&key).is_none(), "dangling edge {key}");
        self.edges.insert(key, meta);
    }

    // -----------------------------------------------------------------------
    // Derived views
    // -----------------------------------------------------------------------

    /// Copy of the graph with every link between `x` and `y` taken down.
    ///
    /// Returns the copy and the number of edges removed. Both nodes stay.
    pub fn without_link(&self, x: &NodeId, y: &NodeId) -> (TopologyGraph, usize) {
        let mut copy = self.clone();
        let before = copy.edges.len();
        copy.edges.retain(|key, _| !key.connects(x, y));
        let removed = before - copy.edges.len();
        (copy, removed)
    }

    /// Copy of the graph with the links between `x` and `y` brought back
    /// from `saved`.
    ///
    /// Only links recorded in `saved` can come back, and only when both
    /// endpoints exist here. Returns the copy and the number of edges added.
    pub fn restore_link(&self, saved: &TopologyGraph, x: &NodeId, y: &NodeId) -> (TopologyGraph, usize) {
        let mut copy = self.clone();
        let mut restored = 0;
        for (key, meta) in saved.edges.iter().filter(|(key, _)| key.connects(x, y)) {
            if copy.insert_edge(key.clone(), meta.clone()).is_ok() {
                restored += 1;
            }
        }
        (copy, restored)
    }

    /// Undirected petgraph view for path queries, plus the index of each node.
    pub fn to_petgraph(&self) -> (UnGraph<NodeId, ()>, BTreeMap<NodeId, NodeIndex>) {
        let mut graph = UnGraph::with_capacity(self.nodes.len(), self.edges.len());
        let mut index = BTreeMap::new();
        for id in self.nodes.keys() {
            index.insert(id.clone(), graph.add_node(id.clone()));
        }
        for key in self.edges.keys() {
            let (a, b) = key.endpoints();
            if let (Some(&ia), Some(&ib)) = (index.get(&a.node), index.get(&b.node)) {
                graph.add_edge(ia, ib, ());
            }
        }
        (graph, index)
    }
}

// ---------------------------------------------------------------------------
// Serialized form
// ---------------------------------------------------------------------------

/// Wire form of a graph. JSON object keys must be strings, so edges are a
/// list of records instead of a map keyed by [`EdgeKey`].
#[derive(Serialize, Deserialize)]
struct GraphRepr {
    nodes: Vec<Node>,
    edges: Vec<EdgeRecord>,
}

#[derive(Serialize, Deserialize)]
struct EdgeRecord {
    endpoints: [Endpoint; 2],
    #[serde(flatten)]
    meta: LinkMeta,
}

impl From<TopologyGraph> for GraphRepr {
    fn from(graph: TopologyGraph) -> Self {
        GraphRepr {
            nodes: graph.nodes.into_values().collect(),
            edges: graph
                .edges
                .into_iter()
                .map(|(key, meta)| EdgeRecord {
                    endpoints: key.into(),
                    meta,
                })
                .collect(),
        }
    }
}

impl TryFrom<GraphRepr> for TopologyGraph {
    type Error = CoreError;

    fn try_from(repr: GraphRepr) -> Result<Self, Self::Error> {
        let mut graph = TopologyGraph::new();
        for node in repr.nodes {
            graph.insert_node(node)?;
        }
        for record in repr.edges {
            graph.insert_edge(EdgeKey::from(record.endpoints), record.meta)?;
        }
        Ok(graph)
    }
}
