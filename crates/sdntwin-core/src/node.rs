//! Node types for the topology graph.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::{NodeId, PortNo};

/// What kind of device a node mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Switch,
    Host,
}

/// A switch or host in the twin.
///
/// `ports` is kept sorted and free of duplicates so that two nodes built from
/// the same observations compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Display label (`s1`, `h3`).
    pub label: String,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub ports: SmallVec<[PortNo; 8]>,
    /// Synthesized for an endpoint the source referenced but never listed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub placeholder: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Node {
    /// A reported switch with the given ports.
    pub fn switch(dpid: u64, ports: impl IntoIterator<Item = PortNo>) -> Self {
        let id = NodeId::switch(dpid);
        Node {
            label: id.0.clone(),
            id,
            kind: NodeKind::Switch,
            ports: sorted_ports(ports),
            placeholder: false,
        }
    }

    /// A switch that only shows up as a link or host endpoint.
    pub fn placeholder_switch(dpid: u64, ports: impl IntoIterator<Item = PortNo>) -> Self {
        Node {
            placeholder: true,
            ..Node::switch(dpid, ports)
        }
    }

    /// A host with the given MAC and display label.
    pub fn host(mac: &str, label: impl Into<String>) -> Self {
        Node {
            id: NodeId::host(mac),
            kind: NodeKind::Host,
            label: label.into(),
            ports: SmallVec::new(),
            placeholder: false,
        }
    }

    pub fn is_switch(&self) -> bool {
        self.kind == NodeKind::Switch
    }

    pub fn is_host(&self) -> bool {
        self.kind == NodeKind::Host
    }
}

fn sorted_ports(ports: impl IntoIterator<Item = PortNo>) -> SmallVec<[PortNo; 8]> {
    let mut ports: SmallVec<[PortNo; 8]> = ports.into_iter().collect();
    ports.sort_unstable();
    ports.dedup();
    ports
}
