//! Error types for acquisition, rendering and orchestration.

use sdntwin_store::StoreError;

/// Failures of a single fetch from the topology source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// Connection failure, timeout, or a non-success HTTP status.
    #[error("source unreachable ({endpoint}): {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// The response could not be parsed as the expected schema.
    #[error("source malformed ({endpoint}): {reason}")]
    Malformed { endpoint: String, reason: String },
}

impl SourceError {
    pub fn unreachable(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::Unreachable {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        SourceError::Malformed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

/// Failures while rendering a generation.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("render task failed: {0}")]
    Task(String),
}

/// Top-level errors of a twin run.
#[derive(Debug, thiserror::Error)]
pub enum TwinError {
    /// A fetch failed and the mode does not retry (snapshot mode).
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Real-time mode gave up after consecutive failed polls.
    #[error("giving up after {attempts} failed poll(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: SourceError,
    },

    /// The store rejected a batch (stale apply or invalid event).
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// Shutdown arrived before the first poll completed, so there is
    /// nothing to render.
    #[error("run interrupted before the first poll completed")]
    Interrupted,

    /// Invalid or unreadable configuration.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl TwinError {
    /// Acquisition failures that end a run, as opposed to local problems
    /// with configuration or output.
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(
            self,
            TwinError::Source(_) | TwinError::RetriesExhausted { .. } | TwinError::Store(_)
        )
    }
}
