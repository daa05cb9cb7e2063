//! Stable identities for topology entities.
//!
//! Node identity comes straight from the controller (datapath id for
//! switches, MAC address for hosts), never from array position, so the same
//! device keeps the same [`NodeId`] across polls.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Switch port number as reported by the controller.
pub type PortNo = u32;

/// Stable node identifier: `s<dpid>` for switches, the lowercase MAC for hosts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Identity of the switch with the given datapath id.
    pub fn switch(dpid: u64) -> Self {
        NodeId(format!("s{dpid}"))
    }

    /// Identity of the host with the given MAC address.
    pub fn host(mac: &str) -> Self {
        NodeId(mac.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

/// One side of a link: a node and, for switches, the local port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortNo>,
}

impl Endpoint {
    pub fn new(node: NodeId, port: Option<PortNo>) -> Self {
        Endpoint { node, port }
    }

    /// Endpoint on port `port` of switch `dpid`.
    pub fn switch_port(dpid: u64, port: PortNo) -> Self {
        Endpoint::new(NodeId::switch(dpid), Some(port))
    }

    /// Host-side endpoint (hosts have no port identity of their own).
    pub fn host(mac: &str) -> Self {
        Endpoint::new(NodeId::host(mac), None)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.node, port),
            None => write!(f, "{}", self.node),
        }
    }
}

/// Unordered pair of endpoints identifying an edge.
///
/// The pair is stored canonically (smaller endpoint first), so `a-b` and
/// `b-a` are the same key. Deserialization goes through [`EdgeKey::new`] and
/// canonicalizes too.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "[Endpoint; 2]", into = "[Endpoint; 2]")]
pub struct EdgeKey {
    a: Endpoint,
    b: Endpoint,
}

impl EdgeKey {
    pub fn new(x: Endpoint, y: Endpoint) -> Self {
        if x <= y {
            EdgeKey { a: x, b: y }
        } else {
            EdgeKey { a: y, b: x }
        }
    }

    /// Both endpoints, smaller first.
    pub fn endpoints(&self) -> (&Endpoint, &Endpoint) {
        (&self.a, &self.b)
    }

    /// Returns `true` if either endpoint sits on `node`.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.a.node == node || &self.b.node == node
    }

    /// Returns `true` if this edge joins `x` and `y`, in either direction.
    pub fn connects(&self, x: &NodeId, y: &NodeId) -> bool {
        (&self.a.node == x && &self.b.node == y) || (&self.a.node == y && &self.b.node == x)
    }

    /// The endpoint opposite to `node`, if `node` is on this edge.
    pub fn opposite(&self, node: &NodeId) -> Option<&Endpoint> {
        if &self.a.node == node {
            Some(&self.b)
        } else if &self.b.node == node {
            Some(&self.a)
        } else {
            None
        }
    }
}

impl From<[Endpoint; 2]> for EdgeKey {
    fn from([x, y]: [Endpoint; 2]) -> Self {
        EdgeKey::new(x, y)
    }
}

impl From<EdgeKey> for [Endpoint; 2] {
    fn from(key: EdgeKey) -> Self {
        [key.a, key.b]
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

/// Monotonic version number of a committed graph.
///
/// Generation 0 is the empty graph before anything was committed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    pub const ZERO: Generation = Generation(0);

    pub fn next(self) -> Generation {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
