//! Host-to-host reachability ("pingall") over a topology graph.
//!
//! Used on replayed snapshots to check what a set of link failures would do
//! to connectivity, without touching the emulated network.

use std::fmt;

use petgraph::algo::{has_path_connecting, DfsSpace};
use serde::Serialize;

use crate::graph::TopologyGraph;
use crate::node::Node;

/// Reachability from one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PingRow {
    pub source: String,
    pub reachable: Vec<String>,
}

/// Result of pinging every ordered pair of hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PingReport {
    pub rows: Vec<PingRow>,
    pub sent: usize,
    pub received: usize,
}

impl PingReport {
    /// Percentage of pings that found no path (0 when there was nothing to ping).
    pub fn loss_percent(&self) -> f64 {
        if self.sent == 0 {
            0.0
        } else {
            100.0 - (self.received as f64 / self.sent as f64) * 100.0
        }
    }
}

impl fmt::Display for PingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            if row.reachable.is_empty() {
                writeln!(f, "{} -> Unreachable", row.source)?;
            } else {
                writeln!(f, "{} -> {}", row.source, row.reachable.join(" "))?;
            }
        }
        write!(
            f,
            "*** Results: {:.2}% packet loss ({}/{} received)",
            self.loss_percent(),
            self.received,
            self.sent
        )
    }
}

/// Checks every ordered pair of distinct hosts for a path.
///
/// Hosts are reported by label in natural order (`h2` before `h10`).
pub fn pingall(graph: &TopologyGraph) -> PingReport {
    let mut hosts: Vec<&Node> = graph.nodes().filter(|n| n.is_host()).collect();
    hosts.sort_by(|a, b| (a.label.len(), &a.label).cmp(&(b.label.len(), &b.label)));

    let (pg, index) = graph.to_petgraph();
    let mut space = DfsSpace::new(&pg);

    let mut rows = Vec::with_capacity(hosts.len());
    let mut sent = 0;
    let mut received = 0;
    for src in &hosts {
        let mut reachable = Vec::new();
        for dst in &hosts {
            if src.id == dst.id {
                continue;
            }
            sent += 1;
            let connected = match (index.get(&src.id), index.get(&dst.id)) {
                (Some(&a), Some(&b)) => has_path_connecting(&pg, a, b, Some(&mut space)),
                _ => false,
            };
            if connected {
                received += 1;
                reachable.push(dst.label.clone());
            }
        }
        rows.push(PingRow {
            source: src.label.clone(),
            reachable,
        });
    }

    PingReport {
        rows,
        sent,
        received,
    }
}
