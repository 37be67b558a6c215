//! Filter trait and filter metadata.
//!
//! The Filter trait is the seam between the graph and the transforms it
//! drives. The graph only knows a filter's role, pad layout and option
//! schema; what a filter does to the frames it receives is its own business.

use crate::core::context::FilterOutput;
use crate::core::error::ProcessingError;
use crate::core::frame::{Frame, FrameFormat};
use crate::core::pad::{OptionDefinition, PadDefinition};
use crate::core::types::OptionValues;
use serde::{Deserialize, Serialize};

/// Boundary role of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterRole {
    /// Accepts frames pushed by the caller
    Source,
    /// Yields frames pulled by the caller
    Sink,
    /// Interior transform
    #[default]
    Transform,
}

impl FilterRole {
    /// Get the display name for this role.
    pub fn display_name(&self) -> &'static str {
        match self {
            FilterRole::Source => "Source",
            FilterRole::Sink => "Sink",
            FilterRole::Transform => "Transform",
        }
    }
}

/// Metadata describing a node kind.
///
/// This is what the registry hands out on lookup: enough to validate
/// names, pad arity and option keys without creating an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterMetadata {
    /// Kind name used for registry lookup (e.g. "volume")
    pub name: String,
    /// Detailed description
    pub description: String,
    /// Boundary role
    pub role: FilterRole,
    /// Input pads in index order (before option-dependent changes)
    pub inputs: Vec<PadDefinition>,
    /// Output pads in index order (before option-dependent changes)
    pub outputs: Vec<PadDefinition>,
    /// Option schema
    pub options: Vec<OptionDefinition>,
    /// Input pad count depends on options
    pub dynamic_inputs: bool,
    /// Output pad count depends on options
    pub dynamic_outputs: bool,
}

impl FilterMetadata {
    /// Create a new metadata builder.
    pub fn builder(name: impl Into<String>) -> FilterMetadataBuilder {
        FilterMetadataBuilder::new(name)
    }

    /// Find an option by name.
    pub fn get_option(&self, name: &str) -> Option<&OptionDefinition> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Get all option names.
    pub fn option_names(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.name.as_str()).collect()
    }
}

/// Builder for FilterMetadata.
pub struct FilterMetadataBuilder {
    name: String,
    description: String,
    role: FilterRole,
    inputs: Vec<PadDefinition>,
    outputs: Vec<PadDefinition>,
    options: Vec<OptionDefinition>,
    dynamic_inputs: bool,
    dynamic_outputs: bool,
}

impl FilterMetadataBuilder {
    /// Create a new builder with required fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            role: FilterRole::Transform,
            inputs: Vec::new(),
            outputs: Vec::new(),
            options: Vec::new(),
            dynamic_inputs: false,
            dynamic_outputs: false,
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the role.
    pub fn role(mut self, role: FilterRole) -> Self {
        self.role = role;
        self
    }

    /// Add an input pad.
    pub fn input(mut self, pad: PadDefinition) -> Self {
        self.inputs.push(pad);
        self
    }

    /// Add an output pad.
    pub fn output(mut self, pad: PadDefinition) -> Self {
        self.outputs.push(pad);
        self
    }

    /// Add an option.
    pub fn option(mut self, option: OptionDefinition) -> Self {
        self.options.push(option);
        self
    }

    /// Mark the input pad count as option-dependent.
    pub fn dynamic_inputs(mut self) -> Self {
        self.dynamic_inputs = true;
        self
    }

    /// Mark the output pad count as option-dependent.
    pub fn dynamic_outputs(mut self) -> Self {
        self.dynamic_outputs = true;
        self
    }

    /// Build the metadata.
    pub fn build(self) -> FilterMetadata {
        FilterMetadata {
            name: self.name,
            description: self.description,
            role: self.role,
            inputs: self.inputs,
            outputs: self.outputs,
            options: self.options,
            dynamic_inputs: self.dynamic_inputs,
            dynamic_outputs: self.dynamic_outputs,
        }
    }
}

/// Outcome of asking a sink for its next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// The slot was filled with a frame.
    Ready,
    /// Nothing buffered yet; upstream may still produce more.
    Again,
    /// Upstream has ended and everything buffered was handed out.
    EndOfStream,
}

/// The trait every node kind implements.
///
/// # Lifecycle
///
/// 1. `init` runs once with the resolved options. Pad layout may depend on
///    them, so `inputs`/`outputs` are only read after `init` succeeds.
/// 2. `negotiate` runs once during graph configuration, in topological
///    order, mapping the formats arriving on each input pad to the formats
///    leaving each output pad.
/// 3. `filter_frame`, `end_of_input` and `flush` run while the caller pulls.
///
/// Sources receive pushed frames through `filter_frame` on pad 0 (their
/// external feed). Sinks buffer what they receive and hand it out through
/// `take_frame`.
///
/// # Thread Safety
///
/// `Send` lets a whole graph move to another thread. Graphs are never
/// shared, so `Sync` is not required.
pub trait Filter: Send {
    /// Get the metadata for this kind.
    fn metadata(&self) -> FilterMetadata;

    /// Apply resolved options. Called exactly once.
    fn init(&mut self, _options: &OptionValues) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Input pads after initialization.
    fn inputs(&self) -> Vec<PadDefinition> {
        self.metadata().inputs
    }

    /// Output pads after initialization.
    fn outputs(&self) -> Vec<PadDefinition> {
        self.metadata().outputs
    }

    /// Map input formats to output formats, or reject them.
    ///
    /// The default passes the first input format to every output, which
    /// suits single-input transforms.
    fn negotiate(&self, inputs: &[FrameFormat]) -> Result<Vec<FrameFormat>, ProcessingError> {
        let format = inputs.first().copied().ok_or_else(|| {
            ProcessingError::UnsupportedFormat("no input format to forward".to_string())
        })?;
        Ok(vec![format; self.outputs().len()])
    }

    /// Process one frame that arrived on an input pad.
    fn filter_frame(
        &mut self,
        pad: usize,
        frame: Frame,
        out: &mut FilterOutput,
    ) -> Result<(), ProcessingError>;

    /// An input pad reached end of stream. Its queued frames were already
    /// delivered.
    fn end_of_input(&mut self, _pad: usize, _out: &mut FilterOutput) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Every input has ended. Emit anything still buffered; the graph
    /// closes all outputs afterwards.
    fn flush(&mut self, _out: &mut FilterOutput) -> Result<(), ProcessingError> {
        Ok(())
    }

    /// Fill `slot` with the next buffered frame. Only sinks implement this.
    fn take_frame(&mut self, _slot: &mut Frame) -> Result<SinkStatus, ProcessingError> {
        Err(ProcessingError::Unsupported("take_frame".to_string()))
    }
}
