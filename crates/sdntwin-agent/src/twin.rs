//! Orchestration of one twin run.
//!
//! A [`Twin`] owns the store and the scheduler. In snapshot mode it polls
//! once and renders the result; in real-time mode it runs a [`RenderLoop`]
//! on its own task next to the scheduler until shutdown.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use sdntwin_store::{TwinSnapshot, TwinStore};

use crate::config::{Mode, TwinConfig};
use crate::error::{RenderError, TwinError};
use crate::render::{RenderLoop, Renderer};
use crate::scheduler::{PollScheduler, RunSummary};
use crate::source::TopologySource;

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct TwinOutcome {
    pub summary: RunSummary,
    /// Last committed state.
    pub snapshot: TwinSnapshot,
}

pub struct Twin<S> {
    store: Arc<TwinStore>,
    scheduler: PollScheduler<S>,
}

impl<S: TopologySource> Twin<S> {
    pub fn new(source: S, mode: Mode, config: &TwinConfig) -> Result<Self, TwinError> {
        config.validate()?;
        let store = Arc::new(TwinStore::new());
        let scheduler = PollScheduler::new(source, Arc::clone(&store), mode, config);
        Ok(Twin { store, scheduler })
    }

    pub fn store(&self) -> &Arc<TwinStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &PollScheduler<S> {
        &self.scheduler
    }

    pub fn mode(&self) -> Mode {
        self.scheduler.mode()
    }

    /// Runs to completion and renders into `renderer`.
    pub async fn run<R>(&mut self, renderer: R, shutdown: CancellationToken) -> Result<TwinOutcome, TwinError>
    where
        R: Renderer + 'static,
    {
        match self.mode() {
            Mode::Snapshot => self.run_snapshot(renderer, shutdown).await,
            Mode::Realtime => self.run_realtime(renderer, shutdown).await,
        }
    }

    async fn run_snapshot<R: Renderer>(
        &mut self,
        mut renderer: R,
        shutdown: CancellationToken,
    ) -> Result<TwinOutcome, TwinError> {
        let summary = self.scheduler.run(shutdown).await?;
        let snapshot = self.store.current();
        renderer.render(&snapshot.graph, snapshot.generation)?;
        Ok(TwinOutcome { summary, snapshot })
    }

    async fn run_realtime<R: Renderer + 'static>(
        &mut self,
        renderer: R,
        shutdown: CancellationToken,
    ) -> Result<TwinOutcome, TwinError> {
        let render_token = shutdown.child_token();
        let render_loop = RenderLoop::new(renderer, &self.store);
        let render_task = tokio::spawn(render_loop.run(render_token.clone()));

        let polled = self.scheduler.run(shutdown).await;
        render_token.cancel();
        let rendered = render_task
            .await
            .map_err(|err| RenderError::Task(err.to_string()))?;

        let summary = polled?;
        let stats = rendered?;
        tracing::info!(renders = stats.renders, generation = %summary.generation, "twin stopped");
        Ok(TwinOutcome {
            summary,
            snapshot: self.store.current(),
        })
    }
}
