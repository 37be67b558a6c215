//! Error types for the filter graph.
//!
//! Uses thiserror for structured errors with context. Errors are designed to:
//! - Name the node, pad or option involved
//! - Keep configuration diagnostics together in one report
//! - Keep filter-side failures separate from graph misuse

use crate::core::pad::PadDirection;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a filter graph instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphId(pub Uuid);

impl GraphId {
    /// Create a new random graph ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Handle to a node owned by a filter graph.
///
/// The handle is a stable arena index tagged with the owning graph, so a
/// handle from one graph is rejected by every other graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    /// Graph that allocated the node.
    pub graph: GraphId,
    /// Position in the graph's arena (construction order).
    pub index: usize,
}

impl NodeId {
    pub(crate) fn new(graph: GraphId, index: usize) -> Self {
        Self { graph, index }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.index)
    }
}

/// Identifier for a link within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub usize);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Top-level error type.
///
/// Every fallible graph operation returns this to its immediate caller.
/// There are no retries: an error is fatal to the node or graph involved.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Unknown filter kind '{name}'")]
    UnknownKind { name: String },

    #[error("Node {0} not found in this graph")]
    NodeNotFound(NodeId),

    #[error("Invalid operation on {node}: {reason}")]
    InvalidOperation { node: NodeId, reason: String },

    #[error("Failed to initialize {node} ({kind}): {source}")]
    Initialization {
        node: NodeId,
        kind: String,
        #[source]
        source: ProcessingError,
    },

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Configuration failed: {}", .report.summary())]
    Configuration { report: ValidationReport },

    #[error("Graph is already configured")]
    AlreadyConfigured,

    #[error("Graph is not configured")]
    NotConfigured,

    #[error("Failed to push frame into {node}: {reason}")]
    Push { node: NodeId, reason: String },

    #[error("Failed to pull frame from {node}: {source}")]
    Pull {
        node: NodeId,
        #[source]
        source: ProcessingError,
    },

    #[error("Graph description error: {0}")]
    Description(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while declaring a link between two pads.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkError {
    #[error("{direction} pad {pad} is out of range on {node} ({count} pads)")]
    PadOutOfRange {
        node: NodeId,
        direction: PadDirection,
        pad: usize,
        count: usize,
    },

    #[error("{direction} pad {pad} on {node} is already linked")]
    PadOccupied {
        node: NodeId,
        direction: PadDirection,
        pad: usize,
    },

    #[error("Node {0} must be initialized before it can be linked")]
    NotInitialized(NodeId),
}

/// Configuration diagnostics collected by the validation pipeline.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Node {0} was never initialized")]
    NotInitialized(NodeId),

    #[error("Node {0} failed to initialize and must be discarded")]
    InitializationFailed(NodeId),

    #[error("Input pad {pad} on {node} ({kind}) is not linked")]
    DanglingInput {
        node: NodeId,
        kind: String,
        pad: usize,
    },

    #[error("Output pad {pad} on {node} ({kind}) is not linked")]
    DanglingOutput {
        node: NodeId,
        kind: String,
        pad: usize,
    },

    #[error("{direction} pad {pad} on {node} is used by more than one link")]
    DuplicateEndpoint {
        node: NodeId,
        direction: PadDirection,
        pad: usize,
    },

    #[error("Graph contains a cycle involving nodes: {nodes:?}")]
    CycleDetected { nodes: Vec<NodeId> },

    #[error("Node {0} is not reachable from any source")]
    UnreachableNode(NodeId),

    #[error("Graph has no source nodes")]
    NoSources,

    #[error("Format negotiation failed on {node}: {reason}")]
    FormatMismatch { node: NodeId, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Failures reported by filter implementations.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcessingError {
    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    #[error("Invalid value for option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Output pad {pad} out of range ({count} pads)")]
    NoSuchOutput { pad: usize, count: usize },

    #[error("Operation not supported by this filter: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Failed(String),
}

// ============================================================================
// Error Utilities
// ============================================================================

impl ValidationError {
    /// Check if this is a fatal error that should stop validation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ValidationError::CycleDetected { .. } | ValidationError::NoSources
        )
    }

    /// Get suggestion for fixing this error.
    pub fn suggested_fix(&self) -> Option<String> {
        match self {
            ValidationError::NotInitialized(node) => {
                Some(format!("Call initialize() on {} before configuring", node))
            }
            ValidationError::InitializationFailed(node) => {
                Some(format!("Call discard_node() on {} and allocate a new node", node))
            }
            ValidationError::DanglingInput { pad, .. } => {
                Some(format!("Link an output pad to input pad {}", pad))
            }
            ValidationError::DanglingOutput { pad, .. } => {
                Some(format!("Link output pad {} to a downstream node or a sink", pad))
            }
            ValidationError::CycleDetected { .. } => {
                Some("Remove the link that feeds a node back into itself".to_string())
            }
            ValidationError::NoSources => Some("Add a 'buffer' source node".to_string()),
            _ => None,
        }
    }

    /// Get list of affected node IDs.
    pub fn affected_nodes(&self) -> Vec<NodeId> {
        match self {
            ValidationError::NotInitialized(node)
            | ValidationError::InitializationFailed(node)
            | ValidationError::UnreachableNode(node)
            | ValidationError::DanglingInput { node, .. }
            | ValidationError::DanglingOutput { node, .. }
            | ValidationError::DuplicateEndpoint { node, .. }
            | ValidationError::FormatMismatch { node, .. } => vec![*node],
            ValidationError::CycleDetected { nodes } => nodes.clone(),
            _ => vec![],
        }
    }
}

impl FilterError {
    /// Get the node this error refers to, if any.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            FilterError::NodeNotFound(node)
            | FilterError::InvalidOperation { node, .. }
            | FilterError::Initialization { node, .. }
            | FilterError::Push { node, .. }
            | FilterError::Pull { node, .. } => Some(*node),
            FilterError::Link(
                LinkError::PadOutOfRange { node, .. }
                | LinkError::PadOccupied { node, .. }
                | LinkError::NotInitialized(node),
            ) => Some(*node),
            _ => None,
        }
    }

    /// The validation report of a failed configuration.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            FilterError::Configuration { report } => Some(report),
            _ => None,
        }
    }
}

/// Result type alias for graph operations.
pub type FilterResult<T> = Result<T, FilterError>;

// ============================================================================
// Validation Report
// ============================================================================

/// Comprehensive validation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether validation passed without errors.
    pub success: bool,
    /// List of errors found.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<ValidationWarning>,
    /// Time taken for validation in milliseconds.
    pub duration_ms: u64,
}

/// Non-fatal validation warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Warning message.
    pub message: String,
    /// Node that triggered the warning, if applicable.
    pub node_id: Option<NodeId>,
    /// Suggestion for addressing the warning.
    pub suggestion: Option<String>,
}

impl ValidationReport {
    /// Create a new empty report (success).
    pub fn new() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
        }
    }

    /// Add an error to the report.
    pub fn add_error(&mut self, error: ValidationError) {
        self.success = false;
        self.errors.push(error);
    }

    /// Add a warning to the report.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Check if the graph can be activated.
    pub fn can_configure(&self) -> bool {
        self.success
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        if self.success {
            if self.warnings.is_empty() {
                "graph is valid".to_string()
            } else {
                format!("graph is valid with {} warning(s)", self.warnings.len())
            }
        } else {
            let first = self
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_default();
            format!("{} error(s), first: {}", self.errors.len(), first)
        }
    }

    /// Get detailed error messages with suggestions.
    pub fn detailed_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .enumerate()
            .map(|(i, error)| {
                let mut msg = format!("{}. {}", i + 1, error);
                if let Some(fix) = error.suggested_fix() {
                    msg.push_str(&format!("\n   -> {}", fix));
                }
                msg
            })
            .collect()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}
