//! Runtime module.
//!
//! This module moves frames through configured filter graphs.

pub mod engine;

pub use engine::{FlowStats, PullResult};
