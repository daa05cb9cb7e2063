//! Scheduler behaviour against a scripted source, on paused tokio time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use sdntwin_agent::{
    BackoffPolicy, Mode, PollScheduler, PollState, SourceError, TopologySource, TwinConfig,
    TwinError,
};
use sdntwin_core::{
    DiffEvent, Dpid, EdgeKey, Endpoint, Generation, NodeId, RawHost, RawLink, RawLinkEnd, RawPort,
    RawPortEntry, RawSwitch, RawTopology,
};
use sdntwin_store::TwinStore;

// ---------------------------------------------------------------------------
// Scripted source
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Step {
    Topology(RawTopology),
    Fail,
    Hang,
}

/// Plays its steps in order and repeats the last one forever.
struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        ScriptedSource {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }
}

impl TopologySource for ScriptedSource {
    async fn fetch(&self) -> Result<RawTopology, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                steps.front().cloned().unwrap()
            }
        };
        match step {
            Step::Topology(raw) => Ok(raw),
            Step::Fail => Err(SourceError::unreachable("scripted", "connection refused")),
            Step::Hang => std::future::pending().await,
        }
    }
}

fn switch(dpid: u64, ports: &[u32]) -> RawSwitch {
    RawSwitch::Described {
        dpid: Dpid(dpid),
        ports: ports
            .iter()
            .map(|&p| RawPortEntry {
                port_no: RawPort(p),
                name: None,
            })
            .collect(),
    }
}

fn end(dpid: u64, port: u32) -> RawLinkEnd {
    RawLinkEnd {
        dpid: Dpid(dpid),
        port_no: RawPort(port),
    }
}

/// s1 and s2 joined by s1:1 - s2:1, reported in both directions.
fn pair() -> RawTopology {
    RawTopology {
        switches: vec![switch(1, &[1]), switch(2, &[1])],
        links: vec![
            RawLink {
                src: end(1, 1),
                dst: end(2, 1),
                bandwidth: None,
                status: None,
            },
            RawLink {
                src: end(2, 1),
                dst: end(1, 1),
                bandwidth: None,
                status: None,
            },
        ],
        hosts: vec![],
    }
}

fn s1_alone() -> RawTopology {
    RawTopology {
        switches: vec![switch(1, &[1])],
        ..RawTopology::default()
    }
}

fn config(debounce: u32) -> TwinConfig {
    TwinConfig {
        poll_interval_ms: 1_000,
        fetch_timeout_ms: 100,
        debounce_polls: debounce,
        backoff: BackoffPolicy {
            initial_ms: 50,
            max_ms: 400,
            max_retries: 2,
        },
        ..TwinConfig::default()
    }
}

fn scheduler(
    steps: impl IntoIterator<Item = Step>,
    mode: Mode,
    cfg: &TwinConfig,
) -> (PollScheduler<ScriptedSource>, Arc<TwinStore>) {
    let store = Arc::new(TwinStore::new());
    let scheduler = PollScheduler::new(ScriptedSource::new(steps), Arc::clone(&store), mode, cfg);
    (scheduler, store)
}

// ---------------------------------------------------------------------------
// Debounce end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn absent_switch_removed_on_third_missed_poll() {
    let (mut scheduler, store) = scheduler(
        [Step::Topology(pair()), Step::Topology(s1_alone())],
        Mode::Realtime,
        &config(3),
    );

    let first = scheduler.poll_once().await.unwrap();
    assert_eq!(first.generation, Generation(1));
    assert_eq!(first.events.len(), 3);

    for _ in 0..2 {
        let outcome = scheduler.poll_once().await.unwrap();
        assert!(outcome.events.is_empty());
        assert_eq!(store.generation(), Generation(1));
    }

    let third = scheduler.poll_once().await.unwrap();
    let link = EdgeKey::new(Endpoint::switch_port(1, 1), Endpoint::switch_port(2, 1));
    assert_eq!(
        third.events,
        vec![
            DiffEvent::EdgeRemoved { key: link },
            DiffEvent::NodeRemoved {
                id: NodeId::switch(2)
            },
        ]
    );
    assert_eq!(third.generation, Generation(2));

    let current = store.current();
    assert_eq!(current.graph.node_count(), 1);
    assert_eq!(current.graph.edge_count(), 0);

    // Nothing further to remove.
    assert!(scheduler.poll_once().await.unwrap().events.is_empty());
}

#[tokio::test]
async fn reappearing_switch_resets_debounce() {
    let (mut scheduler, store) = scheduler(
        [
            Step::Topology(pair()),
            Step::Topology(s1_alone()),
            Step::Topology(s1_alone()),
            Step::Topology(pair()),
            Step::Topology(s1_alone()),
            Step::Topology(s1_alone()),
            Step::Topology(pair()),
        ],
        Mode::Realtime,
        &config(3),
    );

    for _ in 0..7 {
        scheduler.poll_once().await.unwrap();
    }
    assert_eq!(store.generation(), Generation(1));
    assert_eq!(store.current().graph.node_count(), 2);
}

fn bare(topology: RawTopology) -> RawTopology {
    RawTopology {
        switches: topology
            .switches
            .iter()
            .map(|s| RawSwitch::Id(s.dpid()))
            .collect(),
        ..topology
    }
}

fn hosts_on_s1(macs: &[(&str, u32)]) -> RawTopology {
    RawTopology {
        switches: vec![RawSwitch::Id(Dpid(1))],
        links: vec![],
        hosts: macs
            .iter()
            .map(|&(mac, port)| RawHost {
                mac: mac.to_string(),
                attached_switch: Dpid(1),
                attached_port: RawPort(port),
            })
            .collect(),
    }
}

#[tokio::test]
async fn bare_dpid_switches_absorb_short_absence() {
    let (mut scheduler, store) = scheduler(
        [Step::Topology(bare(pair())), Step::Topology(bare(s1_alone()))],
        Mode::Realtime,
        &config(3),
    );

    scheduler.poll_once().await.unwrap();
    let committed = store.current();
    assert_eq!(committed.generation, Generation(1));

    for _ in 0..2 {
        let outcome = scheduler.poll_once().await.unwrap();
        assert!(outcome.events.is_empty(), "unexpected {:?}", outcome.events);
    }
    assert_eq!(store.current().graph, committed.graph);

    let third = scheduler.poll_once().await.unwrap();
    let removed_edges = third.events.iter().filter(|e| matches!(e, DiffEvent::EdgeRemoved { .. })).count();
    let removed_nodes: Vec<_> = third
        .events
        .iter()
        .filter_map(|e| match e {
            DiffEvent::NodeRemoved { id } => Some(id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(removed_edges, 1);
    assert_eq!(removed_nodes, vec![NodeId::switch(2)]);
    assert_eq!(third.generation, Generation(2));
}

#[tokio::test]
async fn flapping_host_keeps_labels_unique() {
    let both = hosts_on_s1(&[("00:00:00:00:00:aa", 1), ("00:00:00:00:00:bb", 2)]);
    let (mut scheduler, store) = scheduler(
        [
            Step::Topology(both.clone()),
            Step::Topology(hosts_on_s1(&[("00:00:00:00:00:bb", 2)])),
            Step::Topology(hosts_on_s1(&[("00:00:00:00:00:bb", 2)])),
            Step::Topology(both),
        ],
        Mode::Realtime,
        &config(3),
    );

    scheduler.poll_once().await.unwrap();
    for _ in 0..3 {
        let outcome = scheduler.poll_once().await.unwrap();
        assert!(outcome.events.is_empty(), "unexpected {:?}", outcome.events);
    }
    assert_eq!(store.generation(), Generation(1));

    let graph = store.current().graph;
    let label = |mac: &str| graph.node(&NodeId::host(mac)).unwrap().label.clone();
    assert_eq!(label("00:00:00:00:00:aa"), "h1");
    assert_eq!(label("00:00:00:00:00:bb"), "h2");
    assert_eq!(graph.resolve("h1").unwrap().id, NodeId::host("00:00:00:00:00:aa"));
}

// ---------------------------------------------------------------------------
// Failures and backoff
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn fetch_timeout_triggers_one_retry() {
    let (mut scheduler, store) = scheduler(
        [Step::Hang, Step::Topology(pair())],
        Mode::Realtime,
        &config(3),
    );
    let mut transitions = scheduler.subscribe_transitions();
    let token = CancellationToken::new();

    let handle = tokio::spawn({
        let token = token.clone();
        async move {
            let result = scheduler.run(token).await;
            (scheduler, result)
        }
    });

    let mut seen = Vec::new();
    loop {
        let state = transitions.recv().await.unwrap();
        seen.push(state);
        if state == PollState::Success {
            break;
        }
    }
    token.cancel();
    let (scheduler, result) = handle.await.unwrap();

    assert_eq!(
        seen,
        vec![
            PollState::Polling,
            PollState::Failed,
            PollState::Polling,
            PollState::Success
        ]
    );
    let summary = result.unwrap();
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.commits, 1);
    assert_eq!(store.generation(), Generation(1));
    assert_eq!(scheduler.state(), PollState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn consecutive_failures_exhaust_retries() {
    let (mut scheduler, store) = scheduler([Step::Fail], Mode::Realtime, &config(3));

    let err = scheduler.run(CancellationToken::new()).await.unwrap_err();
    match err {
        TwinError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(last, SourceError::Unreachable { .. }));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(scheduler.state(), PollState::Stopped);
    assert_eq!(store.generation(), Generation::ZERO);
}

#[tokio::test(start_paused = true)]
async fn failures_below_limit_are_absorbed() {
    let (mut scheduler, store) = scheduler(
        [Step::Fail, Step::Fail, Step::Topology(pair())],
        Mode::Realtime,
        &config(3),
    );
    let mut generations = store.subscribe();
    let token = CancellationToken::new();

    let handle = tokio::spawn({
        let token = token.clone();
        async move { scheduler.run(token).await }
    });

    generations.changed().await.unwrap();
    assert_eq!(generations.borrow().generation, Generation(1));
    token.cancel();

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.failures, 2);
}

// ---------------------------------------------------------------------------
// Modes and shutdown
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn snapshot_mode_failure_is_fatal() {
    let (mut scheduler, store) = scheduler([Step::Fail], Mode::Snapshot, &config(3));

    let err = scheduler.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TwinError::Source(SourceError::Unreachable { .. })));
    assert!(err.is_acquisition_failure());
    assert_eq!(scheduler.state(), PollState::Stopped);
    assert_eq!(store.generation(), Generation::ZERO);
}

#[tokio::test(start_paused = true)]
async fn snapshot_mode_timeout_is_fatal() {
    let (mut scheduler, _store) = scheduler([Step::Hang], Mode::Snapshot, &config(3));

    let err = scheduler.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, TwinError::Source(SourceError::Unreachable { .. })));
}

#[tokio::test(start_paused = true)]
async fn cancel_aborts_inflight_fetch() {
    let cfg = TwinConfig {
        fetch_timeout_ms: 60_000,
        ..config(3)
    };
    let (scheduler, _store) = scheduler([Step::Hang], Mode::Realtime, &cfg);
    let mut state = scheduler.watch_state();
    let token = CancellationToken::new();

    let handle = tokio::spawn({
        let token = token.clone();
        let mut scheduler = scheduler;
        async move {
            let result = scheduler.run(token).await;
            (scheduler, result)
        }
    });

    state.wait_for(|s| *s == PollState::Polling).await.unwrap();
    token.cancel();

    let (scheduler, result) = handle.await.unwrap();
    let summary = result.unwrap();
    assert_eq!(summary.polls, 0);
    assert_eq!(summary.failures, 0);
    assert_eq!(scheduler.state(), PollState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn snapshot_cancelled_mid_fetch_is_interrupted() {
    let cfg = TwinConfig {
        fetch_timeout_ms: 60_000,
        ..config(3)
    };
    let (scheduler, store) = scheduler([Step::Hang], Mode::Snapshot, &cfg);
    let mut state = scheduler.watch_state();
    let token = CancellationToken::new();

    let handle = tokio::spawn({
        let token = token.clone();
        let mut scheduler = scheduler;
        async move {
            let result = scheduler.run(token).await;
            (scheduler, result)
        }
    });

    state.wait_for(|s| *s == PollState::Polling).await.unwrap();
    token.cancel();

    let (scheduler, result) = handle.await.unwrap();
    let err = result.unwrap_err();
    assert!(matches!(err, TwinError::Interrupted));
    assert!(!err.is_acquisition_failure());
    assert_eq!(scheduler.state(), PollState::Stopped);
    assert_eq!(store.generation(), Generation::ZERO);
}

#[tokio::test(start_paused = true)]
async fn realtime_commits_on_every_change() {
    let (mut scheduler, store) = scheduler(
        [Step::Topology(pair()), Step::Topology(s1_alone())],
        Mode::Realtime,
        &config(1),
    );
    let mut generations = store.subscribe();
    let token = CancellationToken::new();

    let handle = tokio::spawn({
        let token = token.clone();
        async move { scheduler.run(token).await }
    });

    generations
        .wait_for(|snap| snap.generation == Generation(2))
        .await
        .unwrap();
    token.cancel();

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.commits, 2);
    assert_eq!(summary.generation, Generation(2));
    assert_eq!(store.current().graph.node_count(), 1);
}
