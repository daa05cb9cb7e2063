//! Property tests for the normalizer and the diff engine.
//!
//! Raw topologies are generated over a small id space so that links, hosts
//! and unlisted switches collide often.

use proptest::prelude::*;

use sdntwin_core::{
    apply_event, diff, normalize, summarize, Debouncer, DiffEvent, Dpid, RawHost, RawLink,
    RawLinkEnd, RawPort, RawSwitch, RawTopology, TopologyGraph,
};

fn raw_switch() -> impl Strategy<Value = RawSwitch> {
    (1u64..6).prop_map(|d| RawSwitch::Id(Dpid(d)))
}

fn raw_end() -> impl Strategy<Value = RawLinkEnd> {
    (1u64..7, 1u32..4).prop_map(|(d, p)| RawLinkEnd {
        dpid: Dpid(d),
        port_no: RawPort(p),
    })
}

fn raw_link() -> impl Strategy<Value = RawLink> {
    (raw_end(), raw_end(), proptest::option::of(1u64..3)).prop_map(|(src, dst, bw)| RawLink {
        src,
        dst,
        bandwidth: bw.map(|b| b * 100),
        status: None,
    })
}

fn raw_host() -> impl Strategy<Value = RawHost> {
    (0u8..6, 1u64..7, 1u32..5).prop_map(|(m, d, p)| RawHost {
        mac: format!("00:00:00:00:00:{m:02x}"),
        attached_switch: Dpid(d),
        attached_port: RawPort(p),
    })
}

fn raw_topology() -> impl Strategy<Value = RawTopology> {
    (
        proptest::collection::vec(raw_switch(), 0..6),
        proptest::collection::vec(raw_link(), 0..8),
        proptest::collection::vec(raw_host(), 0..6),
    )
        .prop_map(|(switches, links, hosts)| RawTopology {
            switches,
            links,
            hosts,
        })
}

/// A topology plus a shuffled copy of it.
fn raw_and_permutation() -> impl Strategy<Value = (RawTopology, RawTopology)> {
    raw_topology().prop_flat_map(|raw| {
        let shuffled = (
            Just(raw.switches.clone()).prop_shuffle(),
            Just(raw.links.clone()).prop_shuffle(),
            Just(raw.hosts.clone()).prop_shuffle(),
        )
            .prop_map(|(switches, links, hosts)| RawTopology {
                switches,
                links,
                hosts,
            });
        (Just(raw), shuffled)
    })
}

proptest! {
    #[test]
    fn normalize_is_order_independent((raw, shuffled) in raw_and_permutation()) {
        prop_assert_eq!(normalize(&raw), normalize(&shuffled));
    }

    #[test]
    fn normalize_never_dangles(raw in raw_topology()) {
        prop_assert!(normalize(&raw).check_invariant().is_ok());
    }

    #[test]
    fn reversed_links_normalize_identically(raw in raw_topology()) {
        let mut reversed = raw.clone();
        for link in &mut reversed.links {
            std::mem::swap(&mut link.src, &mut link.dst);
        }
        prop_assert_eq!(normalize(&raw), normalize(&reversed));
    }

    #[test]
    fn self_diff_is_empty(raw in raw_topology()) {
        let g = normalize(&raw);
        prop_assert!(diff(&g, &g).is_empty());
    }

    #[test]
    fn diff_from_empty_only_adds(raw in raw_topology()) {
        let g = normalize(&raw);
        let events = diff(&TopologyGraph::new(), &g);
        let summary = summarize(&events);
        prop_assert_eq!(summary.nodes_added, g.node_count());
        prop_assert_eq!(summary.edges_added, g.edge_count());
        prop_assert_eq!(summary.total(), events.len());
    }

    #[test]
    fn stepwise_replay_keeps_invariant_and_reaches_target(
        a in raw_topology(),
        b in raw_topology(),
    ) {
        let before = normalize(&a);
        let after = normalize(&b);
        let events = diff(&before, &after);

        let mut graph = before.clone();
        for event in &events {
            prop_assert!(apply_event(&mut graph, event).is_ok(), "event {} failed", event);
            prop_assert!(graph.check_invariant().is_ok(), "invariant broken after {}", event);
        }
        prop_assert_eq!(graph, after);
    }

    #[test]
    fn removals_come_before_additions(a in raw_topology(), b in raw_topology()) {
        let events = diff(&normalize(&a), &normalize(&b));
        let last_removal = events.iter().rposition(DiffEvent::is_removal);
        let first_addition = events.iter().position(DiffEvent::is_addition);
        if let (Some(r), Some(a)) = (last_removal, first_addition) {
            prop_assert!(r < a);
        }
    }

    #[test]
    fn debounce_defers_removal_until_threshold(
        a in raw_topology(),
        b in raw_topology(),
        threshold in 1u32..5,
    ) {
        let committed = normalize(&a);
        let observed = normalize(&b);
        let mut debouncer = Debouncer::new(threshold);

        // The committed graph stays fixed, as it would while nothing commits.
        for poll in 1..threshold {
            let effective = debouncer.observe(&committed, observed.clone());
            let removals = diff(&committed, &effective).into_iter().filter(DiffEvent::is_removal).count();
            prop_assert_eq!(removals, 0, "removal at poll {}", poll);
        }
        let effective = debouncer.observe(&committed, observed.clone());
        let ids = |g: &TopologyGraph| g.nodes().map(|n| n.id.clone()).collect::<Vec<_>>();
        let keys = |g: &TopologyGraph| g.edges().map(|(k, _)| k.clone()).collect::<Vec<_>>();
        prop_assert_eq!(ids(&effective), ids(&observed));
        prop_assert_eq!(keys(&effective), keys(&observed));
        prop_assert_eq!(debouncer.pending(), 0);
    }

    #[test]
    fn debounced_host_labels_stay_unique(
        a in raw_topology(),
        b in raw_topology(),
        threshold in 1u32..4,
    ) {
        let committed = normalize(&a);
        let mut debouncer = Debouncer::new(threshold);
        let effective = debouncer.observe(&committed, normalize(&b));

        let mut labels: Vec<&str> = effective.nodes().filter(|n| n.is_host()).map(|n| n.label.as_str()).collect();
        let total = labels.len();
        labels.sort_unstable();
        labels.dedup();
        prop_assert_eq!(labels.len(), total);
        for node in effective.nodes().filter(|n| n.is_host()) {
            if let Some(known) = committed.node(&node.id) {
                prop_assert_eq!(&node.label, &known.label);
            }
        }
    }
}
