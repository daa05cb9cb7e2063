//! Deterministic content fingerprints for topology graphs using blake3.
//!
//! A fingerprint identifies the exact graph a change set was computed
//! against, and lets snapshot files detect tampering or truncation.
//!
//! # Determinism
//!
//! `TopologyGraph` iterates nodes and edges in key order, and none of the
//! serialized types contain a `HashMap`, so `serde_json::to_vec` yields the
//! same bytes for equal graphs.

use sdntwin_core::{EdgeKey, LinkMeta, Node, TopologyGraph};

/// Computes the blake3 fingerprint of a graph.
pub fn fingerprint(graph: &TopologyGraph) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(graph.node_count() as u64).to_le_bytes());
    for node in graph.nodes() {
        hash_node(&mut hasher, node);
    }
    hasher.update(&(graph.edge_count() as u64).to_le_bytes());
    for (key, meta) in graph.edges() {
        hash_edge(&mut hasher, key, meta);
    }
    hasher.finalize()
}

fn hash_node(hasher: &mut blake3::Hasher, node: &Node) {
    let bytes = serde_json::to_vec(node).expect("Node serialization should never fail");
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(&bytes);
}

fn hash_edge(hasher: &mut blake3::Hasher, key: &EdgeKey, meta: &LinkMeta) {
    let bytes = serde_json::to_vec(&(key, meta)).expect("edge serialization should never fail");
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(&bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdntwin_core::{Endpoint, NodeId};

    fn pair() -> TopologyGraph {
        let mut g = TopologyGraph::new();
        g.insert_node(Node::switch(1, [1])).unwrap();
        g.insert_node(Node::switch(2, [1])).unwrap();
        g.insert_edge(
            EdgeKey::new(Endpoint::switch_port(1, 1), Endpoint::switch_port(2, 1)),
            LinkMeta::trunk(),
        )
        .unwrap();
        g
    }

    #[test]
    fn equal_graphs_equal_fingerprints() {
        assert_eq!(fingerprint(&pair()), fingerprint(&pair()));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut g = TopologyGraph::new();
        g.insert_node(Node::switch(2, [1])).unwrap();
        g.insert_node(Node::switch(1, [1])).unwrap();
        g.insert_edge(
            EdgeKey::new(Endpoint::switch_port(2, 1), Endpoint::switch_port(1, 1)),
            LinkMeta::trunk(),
        )
        .unwrap();
        assert_eq!(fingerprint(&g), fingerprint(&pair()));
    }

    #[test]
    fn attribute_change_changes_fingerprint() {
        let mut g = pair();
        g.replace_node(Node::switch(1, [1, 2])).unwrap();
        assert_ne!(fingerprint(&g), fingerprint(&pair()));
    }

    #[test]
    fn removal_changes_fingerprint() {
        let mut g = pair();
        let key = g.edges().next().unwrap().0.clone();
        g.remove_edge(&key).unwrap();
        assert_ne!(fingerprint(&g), fingerprint(&pair()));
        g.remove_node(&NodeId::switch(2)).unwrap();
        assert_ne!(fingerprint(&g), fingerprint(&TopologyGraph::new()));
    }
}
