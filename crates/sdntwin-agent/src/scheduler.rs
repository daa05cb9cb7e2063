//! The poll scheduler: drives acquisition into the store.
//!
//! One cycle is fetch -> normalize -> debounce -> diff -> apply. Only one
//! fetch is ever in flight because the scheduler awaits each cycle before
//! starting the next, and every fetch is bounded by the configured timeout.
//!
//! State machine:
//!
//! ```text
//! Idle -> Polling -> Success -> Idle
//!                 -> Failed  -> (backoff) -> Polling
//! any  -> Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use sdntwin_core::{diff, normalize, summarize, Debouncer, DiffEvent, Generation};
use sdntwin_store::{ChangeSet, TwinStore};

use crate::config::{BackoffPolicy, Mode, TwinConfig};
use crate::error::{SourceError, TwinError};
use crate::source::TopologySource;

const TRANSITION_CAPACITY: usize = 256;

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollState {
    Idle,
    Polling,
    Success,
    Failed,
    Stopped,
}

/// Result of one successful cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// Generation current after the cycle (unchanged if nothing changed).
    pub generation: Generation,
    /// Events committed by this cycle, empty when nothing changed.
    pub events: Vec<DiffEvent>,
}

impl PollOutcome {
    pub fn committed(&self) -> bool {
        !self.events.is_empty()
    }
}

/// Counters for a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub polls: u64,
    pub commits: u64,
    pub failures: u64,
    pub generation: Generation,
}

impl RunSummary {
    fn record(&mut self, outcome: &PollOutcome) {
        self.polls += 1;
        if outcome.committed() {
            self.commits += 1;
        }
        self.generation = outcome.generation;
    }
}

pub struct PollScheduler<S> {
    source: S,
    store: Arc<TwinStore>,
    debouncer: Debouncer,
    mode: Mode,
    interval: Duration,
    fetch_timeout: Duration,
    backoff: BackoffPolicy,
    state: watch::Sender<PollState>,
    transitions: broadcast::Sender<PollState>,
}

impl<S: TopologySource> PollScheduler<S> {
    pub fn new(source: S, store: Arc<TwinStore>, mode: Mode, config: &TwinConfig) -> Self {
        let (state, _) = watch::channel(PollState::Idle);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        PollScheduler {
            source,
            store,
            debouncer: Debouncer::new(config.debounce_polls),
            mode,
            interval: config.poll_interval(),
            fetch_timeout: config.fetch_timeout(),
            backoff: config.backoff.clone(),
            state,
            transitions,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    /// Latest state, without history.
    pub fn watch_state(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Every transition from now on, in order.
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<PollState> {
        self.transitions.subscribe()
    }

    pub fn store(&self) -> &Arc<TwinStore> {
        &self.store
    }

    fn transition(&self, next: PollState) {
        let previous = self.state.send_replace(next);
        tracing::debug!(from = ?previous, to = ?next, "poll state");
        // No subscribers is fine.
        let _ = self.transitions.send(next);
    }

    /// Runs one acquisition cycle and commits whatever changed.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, TwinError> {
        self.transition(PollState::Polling);
        match self.cycle().await {
            Ok(outcome) => {
                self.transition(PollState::Success);
                Ok(outcome)
            }
            Err(err) => {
                self.transition(PollState::Failed);
                Err(err)
            }
        }
    }

    async fn cycle(&mut self) -> Result<PollOutcome, TwinError> {
        let raw = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(fetched) => fetched?,
            Err(_) => {
                return Err(SourceError::unreachable(
                    "fetch",
                    format!("no answer within {} ms", self.fetch_timeout.as_millis()),
                )
                .into())
            }
        };

        let observed = normalize(&raw);
        let base = self.store.current();
        let effective = self.debouncer.observe(&base.graph, observed);
        let events = diff(&base.graph, &effective);

        if events.is_empty() {
            return Ok(PollOutcome {
                generation: base.generation,
                events,
            });
        }

        tracing::debug!(changes = %summarize(&events), pending = self.debouncer.pending(), "poll found changes");
        let generation = self.store.apply(ChangeSet::against(&base, events.clone()))?;
        Ok(PollOutcome { generation, events })
    }

    /// Runs until the mode's end condition or until `shutdown` is cancelled.
    /// Always leaves the scheduler in [`PollState::Stopped`].
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<RunSummary, TwinError> {
        tracing::info!(mode = ?self.mode, interval_ms = self.interval.as_millis() as u64, "scheduler starting");
        let result = match self.mode {
            Mode::Snapshot => self.run_snapshot(&shutdown).await,
            Mode::Realtime => self.run_realtime(&shutdown).await,
        };
        self.transition(PollState::Stopped);
        match &result {
            Ok(summary) => tracing::info!(
                polls = summary.polls,
                commits = summary.commits,
                generation = %summary.generation,
                "scheduler stopped"
            ),
            Err(TwinError::Interrupted) => tracing::warn!("scheduler interrupted"),
            Err(err) => tracing::error!(error = %err, "scheduler stopped on error"),
        }
        result
    }

    async fn run_snapshot(&mut self, shutdown: &CancellationToken) -> Result<RunSummary, TwinError> {
        let mut summary = RunSummary {
            generation: self.store.generation(),
            ..RunSummary::default()
        };
        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Err(TwinError::Interrupted),
            outcome = self.poll_once() => outcome?,
        };
        summary.record(&outcome);
        Ok(summary)
    }

    async fn run_realtime(&mut self, shutdown: &CancellationToken) -> Result<RunSummary, TwinError> {
        let mut summary = RunSummary {
            generation: self.store.generation(),
            ..RunSummary::default()
        };
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(summary),
                _ = ticker.tick() => {}
            }

            // Retry until a cycle succeeds or the policy gives up.
            loop {
                let result = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Ok(summary),
                    result = self.poll_once() => result,
                };

                match result {
                    Ok(outcome) => {
                        failures = 0;
                        summary.record(&outcome);
                        self.transition(PollState::Idle);
                        break;
                    }
                    Err(TwinError::Source(err)) => {
                        failures += 1;
                        summary.failures += 1;
                        if failures > self.backoff.max_retries {
                            return Err(TwinError::RetriesExhausted {
                                attempts: failures,
                                last: err,
                            });
                        }
                        let delay = self.backoff.delay(failures);
                        tracing::warn!(
                            error = %err,
                            attempt = failures,
                            delay_ms = delay.as_millis() as u64,
                            "poll failed, backing off"
                        );
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => return Ok(summary),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    Err(other) => return Err(other),
                }
            }
        }
    }
}
