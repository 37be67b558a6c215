//! Link types for the graph.

use crate::core::error::{LinkId, NodeId};
use crate::core::frame::FrameFormat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An endpoint of a link (node + pad index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// The node ID.
    pub node: NodeId,
    /// Zero-based pad index on that node.
    pub pad: usize,
}

impl Endpoint {
    /// Create a new endpoint.
    pub fn new(node: NodeId, pad: usize) -> Self {
        Self { node, pad }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.pad)
    }
}

/// A directed link from an output pad to an input pad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Identifier within the owning graph.
    pub id: LinkId,
    /// Source endpoint (output pad).
    pub from: Endpoint,
    /// Target endpoint (input pad).
    pub to: Endpoint,
    /// Format negotiated during configuration.
    pub format: Option<FrameFormat>,
}

impl Link {
    /// Create a new, not yet negotiated link.
    pub fn new(id: LinkId, from: Endpoint, to: Endpoint) -> Self {
        Self {
            id,
            from,
            to,
            format: None,
        }
    }

    /// Whether the link starts and ends on the same node.
    pub fn is_self_link(&self) -> bool {
        self.from.node == self.to.node
    }
}
