//! Structural diff between two topology graphs.
//!
//! [`diff`] emits events in a fixed group order:
//!
//! 1. `EdgeRemoved`
//! 2. `NodeRemoved`
//! 3. `NodeAdded`
//! 4. `EdgeAdded`
//! 5. `NodeUpdated`
//! 6. `EdgeUpdated`
//!
//! Within a group, entries follow key order. A consumer applying the events
//! one by one therefore never sees an edge whose endpoint is missing: edges
//! leave before their nodes and arrive after them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::edge::LinkMeta;
use crate::error::CoreError;
use crate::graph::TopologyGraph;
use crate::id::{EdgeKey, NodeId};
use crate::node::Node;

/// One structural change between two graphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiffEvent {
    NodeAdded { node: Node },
    NodeRemoved { id: NodeId },
    EdgeAdded { key: EdgeKey, meta: LinkMeta },
    EdgeRemoved { key: EdgeKey },
    /// Same identity, refreshed attributes.
    NodeUpdated { node: Node },
    /// Same endpoints, refreshed link metadata.
    EdgeUpdated { key: EdgeKey, meta: LinkMeta },
}

impl DiffEvent {
    pub fn is_removal(&self) -> bool {
        matches!(self, DiffEvent::NodeRemoved { .. } | DiffEvent::EdgeRemoved { .. })
    }

    pub fn is_addition(&self) -> bool {
        matches!(self, DiffEvent::NodeAdded { .. } | DiffEvent::EdgeAdded { .. })
    }

    pub fn is_update(&self) -> bool {
        matches!(self, DiffEvent::NodeUpdated { .. } | DiffEvent::EdgeUpdated { .. })
    }
}

impl fmt::Display for DiffEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffEvent::NodeAdded { node } => write!(f, "+node {}", node.id),
            DiffEvent::NodeRemoved { id } => write!(f, "-node {id}"),
            DiffEvent::EdgeAdded { key, .. } => write!(f, "+edge {key}"),
            DiffEvent::EdgeRemoved { key } => write!(f, "-edge {key}"),
            DiffEvent::NodeUpdated { node } => write!(f, "~node {}", node.id),
            DiffEvent::EdgeUpdated { key, .. } => write!(f, "~edge {key}"),
        }
    }
}

/// Computes the ordered event sequence turning `previous` into `current`.
///
/// Both graphs must satisfy the no-dangling-edge invariant. Under that
/// invariant every edge touching a node that disappears is itself absent
/// from `current`, so it is emitted as `EdgeRemoved` ahead of the node.
pub fn diff(previous: &TopologyGraph, current: &TopologyGraph) -> Vec<DiffEvent> {
    let mut events = Vec::new();

    for (key, _) in previous.edges() {
        if !current.contains_edge(key) {
            events.push(DiffEvent::EdgeRemoved { key: key.clone() });
        }
    }
    for node in previous.nodes() {
        if !current.contains_node(&node.id) {
            events.push(DiffEvent::NodeRemoved {
                id: node.id.clone(),
            });
        }
    }
    for node in current.nodes() {
        if !previous.contains_node(&node.id) {
            events.push(DiffEvent::NodeAdded { node: node.clone() });
        }
    }
    for (key, meta) in current.edges() {
        if !previous.contains_edge(key) {
            events.push(DiffEvent::EdgeAdded {
                key: key.clone(),
                meta: meta.clone(),
            });
        }
    }
    for node in current.nodes() {
        if let Some(old) = previous.node(&node.id) {
            if old != node {
                events.push(DiffEvent::NodeUpdated { node: node.clone() });
            }
        }
    }
    for (key, meta) in current.edges() {
        if let Some(old) = previous.edge(key) {
            if old != meta {
                events.push(DiffEvent::EdgeUpdated {
                    key: key.clone(),
                    meta: meta.clone(),
                });
            }
        }
    }

    events
}

/// Applies one event through the graph's checked mutations.
pub fn apply_event(graph: &mut TopologyGraph, event: &DiffEvent) -> Result<(), CoreError> {
    match event {
        DiffEvent::NodeAdded { node } => graph.insert_node(node.clone()),
        DiffEvent::NodeRemoved { id } => graph.remove_node(id).map(drop),
        DiffEvent::EdgeAdded { key, meta } => graph.insert_edge(key.clone(), meta.clone()),
        DiffEvent::EdgeRemoved { key } => graph.remove_edge(key).map(drop),
        DiffEvent::NodeUpdated { node } => graph.replace_node(node.clone()).map(drop),
        DiffEvent::EdgeUpdated { key, meta } => graph.replace_edge(key, meta.clone()).map(drop),
    }
}

/// Applies events in order, stopping at the first one that does not fit.
///
/// On error `graph` holds the events before the failing one; callers that
/// need all-or-nothing semantics apply to a copy.
pub fn apply_events(graph: &mut TopologyGraph, events: &[DiffEvent]) -> Result<(), CoreError> {
    for event in events {
        apply_event(graph, event)?;
    }
    Ok(())
}

/// Per-kind event counts, for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub edges_added: usize,
    pub edges_removed: usize,
    pub updated: usize,
}

impl DiffSummary {
    pub fn total(&self) -> usize {
        self.nodes_added + self.nodes_removed + self.edges_added + self.edges_removed + self.updated
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "nodes +{}/-{}, edges +{}/-{}, {} updated",
            self.nodes_added, self.nodes_removed, self.edges_added, self.edges_removed, self.updated
        )
    }
}

pub fn summarize(events: &[DiffEvent]) -> DiffSummary {
    let mut summary = DiffSummary::default();
    for event in events {
        match event {
            DiffEvent::NodeAdded { .. } => summary.nodes_added += 1,
            DiffEvent::NodeRemoved { .. } => summary.nodes_removed += 1,
            DiffEvent::EdgeAdded { .. } => summary.edges_added += 1,
            DiffEvent::EdgeRemoved { .. } => summary.edges_removed += 1,
            DiffEvent::NodeUpdated { .. } | DiffEvent::EdgeUpdated { .. } => summary.updated += 1,
        }
    }
    summary
}
