//! Validation module for configuration-time checking.
//!
//! The validation pipeline runs inside `configure` to catch wiring errors
//! before any frame flows, then negotiates link formats.

pub mod pipeline;
pub mod stages;
pub mod negotiation;

pub use pipeline::{ConfigurationPlan, ValidationPipeline};
pub use stages::{
    InitializationValidation, StructuralValidation, TopologyValidation, ValidationStage,
};
pub use negotiation::negotiate_formats;
