//! Twin state store for sdntwin.
//!
//! Holds the single authoritative copy of the mirrored topology together
//! with its [`Generation`](sdntwin_core::Generation) counter.
//!
//! # Modules
//!
//! - [`error`]: StoreError enum with all failure modes
//! - [`hash`]: deterministic blake3 fingerprints of graphs
//! - [`store`]: TwinStore, the atomic batch-apply store
//! - [`snapshot_file`]: saving and loading committed snapshots as JSON

pub mod error;
pub mod hash;
pub mod snapshot_file;
pub mod store;

// Re-export key types for ergonomic use.
pub use error::StoreError;
pub use hash::fingerprint;
pub use snapshot_file::{load_snapshot, save_snapshot, SnapshotFile};
pub use store::{ChangeSet, TwinSnapshot, TwinStore};
