//! Single-input audio transforms: anull, volume, head

use crate::core::context::FilterOutput;
use crate::core::error::ProcessingError;
use crate::core::filter::{Filter, FilterMetadata};
use crate::core::frame::Frame;
use crate::core::pad::{Constraint, OptionDefinition, PadDefinition};
use crate::core::types::{OptionValue, OptionValues};
use crate::filters::registry::FilterRegistry;

/// Register single-input transforms.
pub fn register(registry: &mut FilterRegistry) {
    registry.register(|| Box::new(Anull));
    registry.register(|| Box::new(Volume::default()));
    registry.register(|| Box::new(Head::default()));
}

/// Pass frames through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anull;

impl Filter for Anull {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("anull")
            .description("Pass audio through unchanged")
            .input(PadDefinition::input("default"))
            .output(PadDefinition::output("default"))
            .build()
    }

    fn filter_frame(
        &mut self,
        _pad: usize,
        frame: Frame,
        out: &mut FilterOutput,
    ) -> Result<(), ProcessingError> {
        out.emit(0, frame)
    }
}

/// Scale every sample by a constant gain.
#[derive(Debug, Clone)]
pub struct Volume {
    gain: f32,
}

impl Default for Volume {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

impl Filter for Volume {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("volume")
            .description("Change audio volume by a constant factor")
            .input(PadDefinition::input("default"))
            .output(PadDefinition::output("default"))
            .option(
                OptionDefinition::new("volume", OptionValue::Float(1.0))
                    .with_description("Linear gain applied to every sample")
                    .with_range(0.0, 16.0),
            )
            .build()
    }

    fn init(&mut self, options: &OptionValues) -> Result<(), ProcessingError> {
        self.gain = options.get_float("volume")? as f32;
        Ok(())
    }

    fn filter_frame(
        &mut self,
        _pad: usize,
        mut frame: Frame,
        out: &mut FilterOutput,
    ) -> Result<(), ProcessingError> {
        // Unity gain leaves the buffer shared.
        if self.gain != 1.0 {
            for sample in frame.samples_mut().iter_mut() {
                *sample *= self.gain;
            }
        }
        out.emit(0, frame)
    }
}

/// Forward the first N frames, then end the stream.
#[derive(Debug, Clone, Default)]
pub struct Head {
    remaining: u64,
}

impl Filter for Head {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("head")
            .description("Forward only the first N frames")
            .input(PadDefinition::input("default"))
            .output(PadDefinition::output("default"))
            .option(
                OptionDefinition::new("frames", OptionValue::Integer(1))
                    .with_description("Number of frames to forward")
                    .with_constraint(Constraint::NonNegative),
            )
            .build()
    }

    fn init(&mut self, options: &OptionValues) -> Result<(), ProcessingError> {
        let frames = options.get_integer("frames")?;
        self.remaining = u64::try_from(frames).map_err(|_| ProcessingError::InvalidOption {
            option: "frames".to_string(),
            reason: format!("{} is negative", frames),
        })?;
        Ok(())
    }

    fn filter_frame(
        &mut self,
        _pad: usize,
        frame: Frame,
        out: &mut FilterOutput,
    ) -> Result<(), ProcessingError> {
        if self.remaining > 0 {
            self.remaining -= 1;
            out.emit(0, frame)?;
        }
        if self.remaining == 0 {
            out.close(0);
        }
        Ok(())
    }
}
