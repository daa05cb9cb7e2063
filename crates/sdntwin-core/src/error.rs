//! Core error types for sdntwin-core.
//!
//! These only surface when a graph is mutated through its checked API, which
//! is what event replay uses. Normalization itself never fails.

use thiserror::Error;

use crate::id::{EdgeKey, NodeId};

/// Errors produced by checked graph mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An edge endpoint references a node that is not in the graph.
    #[error("dangling edge {edge}: endpoint {missing} is not in the graph")]
    DanglingEdge { edge: EdgeKey, missing: NodeId },

    /// A node was expected to exist but does not.
    #[error("unknown node: {id}")]
    UnknownNode { id: NodeId },

    /// A node was added twice.
    #[error("duplicate node: {id}")]
    DuplicateNode { id: NodeId },

    /// An edge was expected to exist but does not.
    #[error("unknown edge: {edge}")]
    UnknownEdge { edge: EdgeKey },

    /// An edge was added twice.
    #[error("duplicate edge: {edge}")]
    DuplicateEdge { edge: EdgeKey },

    /// Removing the node would leave edges pointing at nothing.
    #[error("node {id} still has {edges} attached edge(s)")]
    NodeInUse { id: NodeId, edges: usize },
}
