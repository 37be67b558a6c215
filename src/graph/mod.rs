//! Graph module for building filter graphs.
//!
//! A filter graph is a directed acyclic graph (DAG) where nodes wrap filter
//! instances and links carry frames from an output pad to an input pad.

pub mod structure;
pub mod node;
pub mod connection;
pub mod topology;
pub mod serialization;

// Re-export commonly used types
pub use structure::{FilterGraph, GraphOptions};
pub use node::{FilterNode, NodeState};
pub use connection::{Endpoint, Link};
pub use topology::TopologyAnalyzer;
pub use serialization::{BuiltGraph, GraphDescription, LinkDescription, NodeDescription, RawOption};
