//! Graph boundary kinds: `buffer` (source) and `buffersink` (sink).

use crate::core::context::FilterOutput;
use crate::core::error::ProcessingError;
use crate::core::filter::{Filter, FilterMetadata, FilterRole, SinkStatus};
use crate::core::frame::{Frame, FrameFormat};
use crate::core::pad::{Constraint, OptionDefinition, PadDefinition};
use crate::core::types::{OptionValue, OptionValues};
use crate::filters::registry::FilterRegistry;
use std::collections::VecDeque;

/// Register boundary kinds.
pub fn register(registry: &mut FilterRegistry) {
    registry.register(|| Box::new(BufferSource::default()));
    registry.register(|| Box::new(BufferSink::default()));
}

fn format_from_options(options: &OptionValues) -> Result<(u32, u16), ProcessingError> {
    let rate = options.get_integer("sample_rate")?;
    let channels = options.get_integer("channels")?;

    let rate = u32::try_from(rate).map_err(|_| ProcessingError::InvalidOption {
        option: "sample_rate".to_string(),
        reason: format!("{} does not fit a sample rate", rate),
    })?;
    let channels = u16::try_from(channels).map_err(|_| ProcessingError::InvalidOption {
        option: "channels".to_string(),
        reason: format!("{} does not fit a channel count", channels),
    })?;

    Ok((rate, channels))
}

/// Source node: frames pushed by the caller enter the graph here.
///
/// Frames without a timestamp are stamped with the running sample count.
#[derive(Debug, Clone)]
pub struct BufferSource {
    format: FrameFormat,
    next_pts: i64,
}

impl Default for BufferSource {
    fn default() -> Self {
        Self {
            format: FrameFormat::new(48_000, 2),
            next_pts: 0,
        }
    }
}

impl Filter for BufferSource {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("buffer")
            .description("Accept frames pushed by the caller")
            .role(FilterRole::Source)
            .output(PadDefinition::output("default").with_description("Pushed frames"))
            .option(
                OptionDefinition::new("sample_rate", OptionValue::Integer(48_000))
                    .with_description("Sample rate of pushed frames")
                    .with_constraint(Constraint::Positive),
            )
            .option(
                OptionDefinition::new("channels", OptionValue::Integer(2))
                    .with_description("Channel count of pushed frames")
                    .with_range(1.0, 64.0),
            )
            .build()
    }

    fn init(&mut self, options: &OptionValues) -> Result<(), ProcessingError> {
        let (rate, channels) = format_from_options(options)?;
        self.format = FrameFormat::new(rate, channels);
        Ok(())
    }

    fn negotiate(&self, _inputs: &[FrameFormat]) -> Result<Vec<FrameFormat>, ProcessingError> {
        Ok(vec![self.format])
    }

    fn filter_frame(
        &mut self,
        _pad: usize,
        mut frame: Frame,
        out: &mut FilterOutput,
    ) -> Result<(), ProcessingError> {
        let pts = frame.pts().unwrap_or(self.next_pts);
        frame.set_pts(Some(pts));
        let advance = i64::try_from(frame.sample_count()).unwrap_or(i64::MAX);
        self.next_pts = pts.saturating_add(advance);
        out.emit(0, frame)
    }
}

/// Sink node: buffers what reaches it until the caller pulls.
///
/// A zero `sample_rate` or `channels` option accepts any value.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    sample_rate: u32,
    channels: u16,
    fifo: VecDeque<Frame>,
    ended: bool,
}

impl Filter for BufferSink {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("buffersink")
            .description("Buffer frames until the caller pulls them")
            .role(FilterRole::Sink)
            .input(PadDefinition::input("default").with_description("Frames to hand out"))
            .option(
                OptionDefinition::new("sample_rate", OptionValue::Integer(0))
                    .with_description("Required sample rate (0 = any)")
                    .with_constraint(Constraint::NonNegative),
            )
            .option(
                OptionDefinition::new("channels", OptionValue::Integer(0))
                    .with_description("Required channel count (0 = any)")
                    .with_range(0.0, 64.0),
            )
            .build()
    }

    fn init(&mut self, options: &OptionValues) -> Result<(), ProcessingError> {
        let (rate, channels) = format_from_options(options)?;
        self.sample_rate = rate;
        self.channels = channels;
        Ok(())
    }

    fn negotiate(&self, inputs: &[FrameFormat]) -> Result<Vec<FrameFormat>, ProcessingError> {
        let format = inputs.first().copied().ok_or_else(|| {
            ProcessingError::UnsupportedFormat("sink has no input format".to_string())
        })?;

        if self.sample_rate != 0 && format.sample_rate != self.sample_rate {
            return Err(ProcessingError::UnsupportedFormat(format!(
                "sink requires {}Hz, upstream provides {}",
                self.sample_rate, format
            )));
        }
        if self.channels != 0 && format.channels != self.channels {
            return Err(ProcessingError::UnsupportedFormat(format!(
                "sink requires {} channel(s), upstream provides {}",
                self.channels, format
            )));
        }

        Ok(Vec::new())
    }

    fn filter_frame(
        &mut self,
        _pad: usize,
        frame: Frame,
        _out: &mut FilterOutput,
    ) -> Result<(), ProcessingError> {
        self.fifo.push_back(frame);
        Ok(())
    }

    fn flush(&mut self, _out: &mut FilterOutput) -> Result<(), ProcessingError> {
        self.ended = true;
        Ok(())
    }

    fn take_frame(&mut self, slot: &mut Frame) -> Result<SinkStatus, ProcessingError> {
        match self.fifo.pop_front() {
            Some(frame) => {
                *slot = frame;
                Ok(SinkStatus::Ready)
            }
            None if self.ended => Ok(SinkStatus::EndOfStream),
            None => Ok(SinkStatus::Again),
        }
    }
}
