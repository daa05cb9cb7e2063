//! Link attributes carried on topology edges.

use serde::{Deserialize, Serialize};

/// Which kind of link an edge mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Switch-to-switch link discovered by the controller.
    Trunk,
    /// Host-to-switch attachment.
    Access,
}

/// Link metadata. Optional fields are only set when the source reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMeta {
    pub kind: LinkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_mbps: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl LinkMeta {
    pub fn trunk() -> Self {
        LinkMeta {
            kind: LinkKind::Trunk,
            bandwidth_mbps: None,
            status: None,
        }
    }

    pub fn access() -> Self {
        LinkMeta {
            kind: LinkKind::Access,
            bandwidth_mbps: None,
            status: None,
        }
    }

    pub fn is_trunk(&self) -> bool {
        self.kind == LinkKind::Trunk
    }

    /// Folds a second report of the same link into this one.
    ///
    /// Controllers report every link once per direction and the two reports
    /// may disagree. The result must not depend on which one came first, so
    /// the larger bandwidth and the smaller status string win.
    pub fn merge(&mut self, other: &LinkMeta) {
        self.bandwidth_mbps = match (self.bandwidth_mbps, other.bandwidth_mbps) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.status = match (self.status.take(), other.status.as_ref()) {
            (Some(a), Some(b)) => Some(if &a <= b { a } else { b.clone() }),
            (a, b) => a.or_else(|| b.cloned()),
        };
    }
}
