//! Topology data model and change detection for the sdntwin digital twin.
//!
//! The crate is pure: no I/O, no clocks. Raw controller records go in
//! ([`raw`]), a canonical [`TopologyGraph`] comes out of [`normalize`], and
//! [`diff`] turns two graphs into an ordered list of [`DiffEvent`]s.

pub mod debounce;
pub mod diff;
pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;
pub mod normalize;
pub mod raw;
pub mod reach;

// Re-export commonly used types
pub use debounce::Debouncer;
pub use diff::{apply_event, apply_events, diff, summarize, DiffEvent, DiffSummary};
pub use edge::{LinkKind, LinkMeta};
pub use error::CoreError;
pub use graph::TopologyGraph;
pub use id::{EdgeKey, Endpoint, Generation, NodeId, PortNo};
pub use node::{Node, NodeKind};
pub use normalize::normalize;
pub use raw::{
    Dpid, RawAttachment, RawHost, RawHostsPayload, RawLink, RawLinkEnd, RawPort, RawPortEntry,
    RawSwitch, RawTopology,
};
pub use reach::{pingall, PingReport, PingRow};
