//! The twin state store: single authoritative graph plus generation.
//!
//! [`TwinStore`] keeps the committed [`TwinSnapshot`] inside a
//! `tokio::sync::watch` channel. The channel is both the storage and the
//! notification path:
//!
//! - readers clone the current snapshot (an `Arc` to an immutable graph), so
//!   they never see a half-applied batch;
//! - `apply` builds the next graph from a copy and swaps it in while holding
//!   the channel's write lock, which also serializes concurrent writers;
//! - subscribers are woken once per commit and always read the latest
//!   snapshot, so a slow consumer skips intermediate generations instead of
//!   queueing them.

use std::sync::Arc;

use tokio::sync::watch;

use sdntwin_core::{apply_events, summarize, DiffEvent, Generation, TopologyGraph};

use crate::error::StoreError;
use crate::hash::fingerprint;

/// An immutable committed version of the twin.
#[derive(Debug, Clone)]
pub struct TwinSnapshot {
    pub graph: Arc<TopologyGraph>,
    pub generation: Generation,
    pub fingerprint: blake3::Hash,
}

impl TwinSnapshot {
    /// The empty graph at generation 0.
    pub fn genesis() -> Self {
        let graph = TopologyGraph::new();
        TwinSnapshot {
            fingerprint: fingerprint(&graph),
            graph: Arc::new(graph),
            generation: Generation::ZERO,
        }
    }
}

/// A batch of events together with the snapshot they were computed from.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    base_generation: Generation,
    base_fingerprint: blake3::Hash,
    events: Vec<DiffEvent>,
}

impl ChangeSet {
    /// Wraps `events`, which must have been computed from `base.graph`.
    pub fn against(base: &TwinSnapshot, events: Vec<DiffEvent>) -> Self {
        ChangeSet {
            base_generation: base.generation,
            base_fingerprint: base.fingerprint,
            events,
        }
    }

    pub fn base_generation(&self) -> Generation {
        self.base_generation
    }

    pub fn events(&self) -> &[DiffEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Owner of the committed topology.
pub struct TwinStore {
    state: watch::Sender<TwinSnapshot>,
}

impl TwinStore {
    /// Creates a store holding the empty graph at generation 0.
    pub fn new() -> Self {
        let (state, _) = watch::channel(TwinSnapshot::genesis());
        TwinStore { state }
    }

    /// The committed snapshot.
    pub fn current(&self) -> TwinSnapshot {
        self.state.borrow().clone()
    }

    pub fn generation(&self) -> Generation {
        self.state.borrow().generation
    }

    /// Receiver that is notified on every commit.
    pub fn subscribe(&self) -> watch::Receiver<TwinSnapshot> {
        self.state.subscribe()
    }

    /// Commits a batch atomically and returns the new generation.
    ///
    /// An empty batch commits nothing and returns the current generation.
    /// On any error the committed state is untouched.
    pub fn apply(&self, change: ChangeSet) -> Result<Generation, StoreError> {
        let mut outcome = Err(StoreError::StaleApply {
            based_on: change.base_generation,
            current: Generation::ZERO,
        });

        self.state.send_if_modified(|committed| {
            if committed.generation != change.base_generation
                || committed.fingerprint != change.base_fingerprint
            {
                outcome = Err(StoreError::StaleApply {
                    based_on: change.base_generation,
                    current: committed.generation,
                });
                return false;
            }
            if change.events.is_empty() {
                outcome = Ok(committed.generation);
                return false;
            }

            let mut next = TopologyGraph::clone(&committed.graph);
            if let Err(err) = apply_events(&mut next, &change.events) {
                outcome = Err(err.into());
                return false;
            }

            let generation = committed.generation.next();
            *committed = TwinSnapshot {
                fingerprint: fingerprint(&next),
                graph: Arc::new(next),
                generation,
            };
            outcome = Ok(generation);
            true
        });

        match &outcome {
            Ok(generation) if !change.events.is_empty() => {
                tracing::info!(
                    generation = generation.0,
                    changes = %summarize(&change.events),
                    "committed topology generation"
                );
            }
            Err(err) => tracing::error!(error = %err, "topology batch rejected"),
            Ok(_) => {}
        }
        outcome
    }
}

impl Default for TwinStore {
    fn default() -> Self {
        Self::new()
    }
}
