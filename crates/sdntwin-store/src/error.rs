//! Store error types for sdntwin-store.

use thiserror::Error;

use sdntwin_core::{CoreError, Generation};

/// Errors produced by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The change set was computed against a graph that is no longer the
    /// committed one. Only one writer exists, so this is a programming error.
    #[error("stale apply: change set based on generation {based_on}, store is at generation {current}")]
    StaleApply {
        based_on: Generation,
        current: Generation,
    },

    /// An event in the batch does not fit the committed graph.
    #[error("invalid event in batch: {0}")]
    InvalidEvent(#[from] CoreError),

    /// A snapshot file's content does not match its recorded fingerprint.
    #[error("snapshot integrity error: {reason}")]
    Integrity { reason: String },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing a snapshot file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
