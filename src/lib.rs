//! # Filtergraph - Push/Pull Media Filter Graphs
//!
//! Filtergraph builds directed graphs of media filters. Frames are pushed
//! into source nodes and pulled out of sink nodes; filters in between run
//! on demand while a sink is pulled.
//!
//! ## Features
//!
//! - **Registry-driven nodes**: node kinds are looked up by name in a shared registry
//! - **Staged options**: options are set as strings and parsed once on initialization
//! - **One-shot configuration**: structure, cycles and formats are checked before any frame moves
//! - **Pull scheduling**: filters run only when a sink asks for a frame
//! - **Shared frames**: frame buffers are reference counted and copied on write
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filtergraph::prelude::*;
//!
//! let mut graph = FilterGraph::create(FilterRegistry::shared())?;
//!
//! let src = graph.allocate_node("buffer")?;
//! graph.set_option(src, "channels", "1")?;
//! graph.initialize(src)?;
//!
//! let gain = graph.allocate_node("volume")?;
//! graph.set_option(gain, "volume", "0.5")?;
//! graph.initialize(gain)?;
//!
//! let sink = graph.allocate_node("buffersink")?;
//! graph.initialize(sink)?;
//!
//! graph.link(src, 0, gain, 0)?;
//! graph.link(gain, 0, sink, 0)?;
//! graph.configure()?;
//!
//! let frame = Frame::new(FrameFormat::new(48_000, 1), vec![1.0; 480]);
//! graph.push_frame(src, Some(&frame))?;
//! graph.push_frame(src, None)?;
//!
//! while let Some(out) = graph.pull_frame(sink).into_result()? {
//!     println!("{:?}", out);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: frames, options, pads, the `Filter` trait and errors
//! - [`graph`]: the graph arena, linking, topology and description files
//! - [`validation`]: configuration checks and format negotiation
//! - [`execution`]: pushing, pulling and the scheduler
//! - [`filters`]: the kind registry and built-in kinds
//!
//! ## Writing a Filter
//!
//! Implement [`Filter`](core::Filter) and register a factory:
//!
//! ```rust,ignore
//! use filtergraph::prelude::*;
//!
//! struct Invert;
//!
//! impl Filter for Invert {
//!     fn metadata(&self) -> FilterMetadata {
//!         FilterMetadata::builder("invert")
//!             .description("Flip the sign of every sample")
//!             .input(PadDefinition::input("default"))
//!             .output(PadDefinition::output("default"))
//!             .build()
//!     }
//!
//!     fn filter_frame(
//!         &mut self,
//!         _pad: usize,
//!         mut frame: Frame,
//!         out: &mut FilterOutput,
//!     ) -> Result<(), ProcessingError> {
//!         frame.samples_mut().iter_mut().for_each(|s| *s = -*s);
//!         out.emit(0, frame)
//!     }
//! }
//!
//! let registry = RegistryBuilder::new()
//!     .with_builtins(true)
//!     .register(|| Box::new(Invert))
//!     .build();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod filters;
pub mod graph;
pub mod validation;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use filtergraph::prelude::*;
/// ```
pub mod prelude {
    // Frames and options
    pub use crate::core::frame::{Frame, FrameFormat};
    pub use crate::core::types::{OptionKind, OptionValue, OptionValues};
    pub use crate::core::pad::{Constraint, OptionDefinition, PadDefinition, PadDirection};

    // Filter trait and metadata
    pub use crate::core::filter::{Filter, FilterMetadata, FilterRole, SinkStatus};
    pub use crate::core::context::FilterOutput;

    // Errors
    pub use crate::core::error::{
        FilterError, FilterResult, GraphId, LinkError, LinkId, NodeId, ProcessingError,
        ValidationError, ValidationReport, ValidationWarning,
    };

    // Graph
    pub use crate::graph::structure::{FilterGraph, GraphOptions};
    pub use crate::graph::node::{FilterNode, NodeState};
    pub use crate::graph::connection::{Endpoint, Link};
    pub use crate::graph::topology::TopologyAnalyzer;
    pub use crate::graph::serialization::{
        BuiltGraph, GraphDescription, LinkDescription, NodeDescription, RawOption,
    };

    // Validation
    pub use crate::validation::pipeline::{ConfigurationPlan, ValidationPipeline};
    pub use crate::validation::stages::{
        InitializationValidation, StructuralValidation, TopologyValidation, ValidationStage,
    };

    // Runtime
    pub use crate::execution::engine::{FlowStats, PullResult};

    // Registry
    pub use crate::filters::registry::{FilterFactory, FilterRegistry, RegistryBuilder, RegistryEntry};

    // Built-in kinds
    pub use crate::filters::builtin::{
        // Boundaries
        BufferSink, BufferSource,
        // Audio
        Anull, Head, Volume,
        // Routing
        AMix, ASplit, MixDuration,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
