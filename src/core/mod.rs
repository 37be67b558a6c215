//! Core types and traits for the filter graph.
//!
//! This module contains the foundational types that make up the graph:
//! - Frames and frame formats
//! - Option values and option schemas
//! - Pad definitions
//! - The Filter trait and its metadata
//! - Error types

pub mod types;
pub mod pad;
pub mod error;
pub mod context;
pub mod filter;
pub mod frame;

// Re-export commonly used types
pub use types::{OptionKind, OptionValue, OptionValues};
pub use pad::{Constraint, OptionDefinition, PadDefinition, PadDirection};
pub use error::{FilterError, FilterResult, LinkError, ProcessingError, ValidationError};
pub use context::FilterOutput;
pub use filter::{Filter, FilterMetadata, FilterRole, SinkStatus};
pub use frame::{Frame, FrameFormat};
