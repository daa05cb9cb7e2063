//! Debounce filter between the normalizer and the diff engine.
//!
//! Controllers flap: a switch or link can vanish from one poll and be back in
//! the next. [`Debouncer::observe`] keeps committed entities in the effective
//! graph until they have been missing for `threshold` consecutive polls, so
//! only sustained absences turn into removal events.

use std::collections::{HashMap, HashSet};

use crate::graph::TopologyGraph;
use crate::id::{EdgeKey, Endpoint, NodeId};

/// Tracks consecutive misses per committed node and edge.
#[derive(Debug, Clone)]
pub struct Debouncer {
    threshold: u32,
    node_misses: HashMap<NodeId, u32>,
    edge_misses: HashMap<EdgeKey, u32>,
}

impl Debouncer {
    /// Creates a debouncer that removes entities after `threshold`
    /// consecutive absent polls. A threshold of 0 is treated as 1 (no
    /// debouncing).
    pub fn new(threshold: u32) -> Self {
        Debouncer {
            threshold: threshold.max(1),
            node_misses: HashMap::new(),
            edge_misses: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Consecutive misses recorded so far for a node (0 if present).
    pub fn node_misses(&self, id: &NodeId) -> u32 {
        self.node_misses.get(id).copied().unwrap_or(0)
    }

    /// Consecutive misses recorded so far for an edge (0 if present).
    pub fn edge_misses(&self, key: &EdgeKey) -> u32 {
        self.edge_misses.get(key).copied().unwrap_or(0)
    }

    /// Number of entities currently held back from removal.
    pub fn pending(&self) -> usize {
        self.node_misses.len() + self.edge_misses.len()
    }

    /// Folds one poll into the miss counters and returns the effective graph.
    ///
    /// The effective graph is `observed` plus every entity of `committed`
    /// that is absent from `observed` for fewer than `threshold` consecutive
    /// polls. A retained edge is dropped anyway once one of its endpoints is
    /// dropped, so the result always satisfies the graph invariant.
    ///
    /// Retained edges put their switch ports back on the surviving nodes,
    /// and hosts already in `committed` keep their committed label. A held
    /// back entity therefore changes nothing else in the effective graph.
    pub fn observe(&mut self, committed: &TopologyGraph, observed: TopologyGraph) -> TopologyGraph {
        let mut effective = observed;
        let mut node_misses = HashMap::new();
        let mut edge_misses = HashMap::new();

        for node in committed.nodes() {
            if effective.contains_node(&node.id) {
                continue;
            }
            let misses = self.node_misses(&node.id) + 1;
            if misses < self.threshold {
                node_misses.insert(node.id.clone(), misses);
                effective.put_node(node.clone());
            } else {
                tracing::debug!(node = %node.id, misses, "node absent past debounce threshold");
            }
        }

        for (key, meta) in committed.edges() {
            if effective.contains_edge(key) {
                continue;
            }
            let misses = self.edge_misses(key) + 1;
            let (a, b) = key.endpoints();
            let anchored = effective.contains_node(&a.node) && effective.contains_node(&b.node);
            if misses < self.threshold && anchored {
                edge_misses.insert(key.clone(), misses);
                for end in [a, b] {
                    restore_port(&mut effective, end);
                }
                effective.put_edge(key.clone(), meta.clone());
            } else {
                tracing::debug!(edge = %key, misses, "edge absent past debounce threshold");
            }
        }

        keep_host_labels(committed, &mut effective);

        self.node_misses = node_misses;
        self.edge_misses = edge_misses;
        effective
    }
}

fn restore_port(graph: &mut TopologyGraph, end: &Endpoint) {
    let (Some(port), Some(node)) = (end.port, graph.node_mut(&end.node)) else {
        return;
    };
    if let Err(pos) = node.ports.binary_search(&port) {
        node.ports.insert(pos, port);
    }
}

/// Hosts known to `committed` keep their label. New hosts get the lowest
/// free `h<n>` labels, in the order the normalizer numbered them.
fn keep_host_labels(committed: &TopologyGraph, effective: &mut TopologyGraph) {
    let mut taken: HashSet<String> = HashSet::new();
    let mut fresh: Vec<(String, NodeId)> = Vec::new();

    for node in effective.nodes().filter(|n| n.is_host()) {
        match committed.node(&node.id) {
            Some(known) => {
                taken.insert(known.label.clone());
            }
            None => fresh.push((node.label.clone(), node.id.clone())),
        }
    }
    fresh.sort_by(|(x, _), (y, _)| (x.len(), x).cmp(&(y.len(), y)));

    let kept: Vec<(NodeId, String)> = effective
        .nodes()
        .filter(|n| n.is_host())
        .filter_map(|n| committed.node(&n.id).map(|known| (n.id.clone(), known.label.clone())))
        .collect();
    for (id, label) in kept {
        if let Some(node) = effective.node_mut(&id) {
            node.label = label;
        }
    }

    let mut next = 1;
    for (_, id) in fresh {
        while taken.contains(&format!("h{next}")) {
            next += 1;
        }
        let label = format!("h{next}");
        next += 1;
        if let Some(node) = effective.node_mut(&id) {
            node.label = label;
        }
    }
}
