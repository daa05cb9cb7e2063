//! Raw controller records to canonical [`TopologyGraph`].
//!
//! `normalize` is a pure function of the *set* of reported records: every
//! intermediate collection is keyed on datapath ids, ports and MACs, so
//! reordering the payload cannot change the result.
//!
//! Rules:
//! 1. Every listed switch becomes a switch node with its reported ports.
//! 2. Links are deduplicated as unordered endpoint pairs, since the
//!    controller reports each link once per direction. Link ports are merged
//!    into the switches' port lists.
//! 3. Hosts seen on a port that carries a switch-to-switch link are dropped
//!    (controllers learn every MAC on trunk ports). The remaining hosts are
//!    labelled `h1`, `h2`, ... in `(switch, port, mac)` order.
//! 4. A link or host that references an unlisted switch gets a placeholder
//!    switch node, so no edge ever dangles.

use std::collections::{BTreeMap, BTreeSet};

use crate::edge::LinkMeta;
use crate::graph::TopologyGraph;
use crate::id::{EdgeKey, Endpoint, NodeId, PortNo};
use crate::node::Node;
use crate::raw::RawTopology;

/// Builds the canonical graph for one poll result.
pub fn normalize(raw: &RawTopology) -> TopologyGraph {
    let mut listed: BTreeSet<u64> = BTreeSet::new();
    let mut switch_ports: BTreeMap<u64, BTreeSet<PortNo>> = BTreeMap::new();

    for switch in &raw.switches {
        let dpid = switch.dpid().0;
        listed.insert(dpid);
        switch_ports.entry(dpid).or_default().extend(switch.ports());
    }

    let mut trunk_ports: BTreeSet<(u64, PortNo)> = BTreeSet::new();
    let mut links: BTreeMap<EdgeKey, LinkMeta> = BTreeMap::new();

    for link in &raw.links {
        let src = (link.src.dpid.0, link.src.port_no.0);
        let dst = (link.dst.dpid.0, link.dst.port_no.0);
        if src == dst {
            continue;
        }
        for (dpid, port) in [src, dst] {
            trunk_ports.insert((dpid, port));
            switch_ports.entry(dpid).or_default().insert(port);
        }

        let key = EdgeKey::new(
            Endpoint::switch_port(src.0, src.1),
            Endpoint::switch_port(dst.0, dst.1),
        );
        let meta = LinkMeta {
            bandwidth_mbps: link.bandwidth,
            status: link.status.clone(),
            ..LinkMeta::trunk()
        };
        links
            .entry(key)
            .and_modify(|existing| existing.merge(&meta))
            .or_insert(meta);
    }

    // (switch, port, mac) ordering decides host labels.
    let mut attachments: BTreeSet<(u64, PortNo, NodeId)> = BTreeSet::new();
    for host in &raw.hosts {
        let at = (host.attached_switch.0, host.attached_port.0);
        if trunk_ports.contains(&at) {
            continue;
        }
        attachments.insert((at.0, at.1, NodeId::host(&host.mac)));
    }

    let mut hosts: Vec<(u64, PortNo, NodeId)> = Vec::with_capacity(attachments.len());
    let mut seen_macs: BTreeSet<NodeId> = BTreeSet::new();
    for (dpid, port, mac) in attachments {
        // A MAC reported on two ports keeps its lowest attachment.
        if seen_macs.insert(mac.clone()) {
            switch_ports.entry(dpid).or_default().insert(port);
            hosts.push((dpid, port, mac));
        }
    }

    let mut graph = TopologyGraph::new();
    for (dpid, ports) in switch_ports {
        let node = if listed.contains(&dpid) {
            Node::switch(dpid, ports)
        } else {
            Node::placeholder_switch(dpid, ports)
        };
        graph.put_node(node);
    }
    for (key, meta) in links {
        graph.put_edge(key, meta);
    }
    for (n, (dpid, port, mac)) in hosts.into_iter().enumerate() {
        graph.put_node(Node::host(mac.as_str(), format!("h{}", n + 1)));
        graph.put_edge(
            EdgeKey::new(Endpoint::new(mac, None), Endpoint::switch_port(dpid, port)),
            LinkMeta::access(),
        );
    }

    graph
}
