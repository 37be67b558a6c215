//! Fan-out and fan-in: asplit, amix

use crate::core::context::FilterOutput;
use crate::core::error::ProcessingError;
use crate::core::filter::{Filter, FilterMetadata};
use crate::core::frame::{Frame, FrameFormat};
use crate::core::pad::{Constraint, OptionDefinition, PadDefinition};
use crate::core::types::{OptionValue, OptionValues};
use crate::filters::registry::FilterRegistry;
use std::collections::VecDeque;

/// Register routing filters.
pub fn register(registry: &mut FilterRegistry) {
    registry.register(|| Box::new(ASplit::default()));
    registry.register(|| Box::new(AMix::default()));
}

fn pad_count(options: &OptionValues, name: &str) -> Result<usize, ProcessingError> {
    let count = options.get_integer(name)?;
    usize::try_from(count).map_err(|_| ProcessingError::InvalidOption {
        option: name.to_string(),
        reason: format!("{} is not a pad count", count),
    })
}

fn numbered_pads(prefix: &str, count: usize, make: fn(String) -> PadDefinition) -> Vec<PadDefinition> {
    (0..count).map(|i| make(format!("{}{}", prefix, i))).collect()
}

/// Send every input frame to N outputs.
///
/// Outputs share the input's sample buffer.
#[derive(Debug, Clone)]
pub struct ASplit {
    outputs: usize,
}

impl Default for ASplit {
    fn default() -> Self {
        Self { outputs: 2 }
    }
}

impl Filter for ASplit {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("asplit")
            .description("Split audio into several identical outputs")
            .input(PadDefinition::input("default"))
            .output(PadDefinition::output("output0"))
            .output(PadDefinition::output("output1"))
            .option(
                OptionDefinition::new("outputs", OptionValue::Integer(2))
                    .with_description("Number of output pads")
                    .with_range(1.0, 16.0),
            )
            .dynamic_outputs()
            .build()
    }

    fn init(&mut self, options: &OptionValues) -> Result<(), ProcessingError> {
        self.outputs = pad_count(options, "outputs")?;
        Ok(())
    }

    fn outputs(&self) -> Vec<PadDefinition> {
        numbered_pads("output", self.outputs, |name| PadDefinition::output(name))
    }

    fn filter_frame(
        &mut self,
        _pad: usize,
        frame: Frame,
        out: &mut FilterOutput,
    ) -> Result<(), ProcessingError> {
        for pad in 0..self.outputs {
            if !out.is_closed(pad) {
                out.emit(pad, frame.clone())?;
            }
        }
        Ok(())
    }
}

/// When a mixer stops producing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixDuration {
    /// Keep mixing until every input has ended.
    Longest,
    /// Stop as soon as any input ends.
    Shortest,
}

/// Mix N inputs of identical format into one output.
///
/// One output frame is produced from the head frame of every input that
/// still has data. With `normalize`, the sum is divided by the number of
/// contributing inputs.
#[derive(Debug, Clone)]
pub struct AMix {
    duration: MixDuration,
    normalize: bool,
    queues: Vec<VecDeque<Frame>>,
    ended: Vec<bool>,
}

impl Default for AMix {
    fn default() -> Self {
        Self {
            duration: MixDuration::Longest,
            normalize: true,
            queues: vec![VecDeque::new(); 2],
            ended: vec![false; 2],
        }
    }
}

impl AMix {
    /// Mix while every input either has a frame queued or has ended.
    fn mix_ready(&mut self, out: &mut FilterOutput) -> Result<(), ProcessingError> {
        loop {
            if out.is_closed(0) {
                self.queues.iter_mut().for_each(VecDeque::clear);
                return Ok(());
            }

            let ready = self
                .queues
                .iter()
                .zip(&self.ended)
                .all(|(queue, ended)| !queue.is_empty() || *ended);
            if !ready {
                return Ok(());
            }

            let heads: Vec<Frame> = self.queues.iter_mut().filter_map(VecDeque::pop_front).collect();
            if heads.is_empty() {
                return Ok(());
            }
            out.emit(0, self.mix(&heads))?;
        }
    }

    fn mix(&self, heads: &[Frame]) -> Frame {
        let first = &heads[0];
        let len = heads.iter().map(|f| f.samples().len()).max().unwrap_or(0);
        let mut mixed = vec![0.0f32; len];

        for frame in heads {
            for (acc, sample) in mixed.iter_mut().zip(frame.samples()) {
                *acc += *sample;
            }
        }
        if self.normalize && heads.len() > 1 {
            let scale = 1.0 / heads.len() as f32;
            mixed.iter_mut().for_each(|s| *s *= scale);
        }

        let mut frame = Frame::new(first.format(), mixed);
        frame.set_pts(first.pts());
        frame
    }
}

impl Filter for AMix {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("amix")
            .description("Mix several audio inputs into one")
            .input(PadDefinition::input("input0"))
            .input(PadDefinition::input("input1"))
            .output(PadDefinition::output("default"))
            .option(
                OptionDefinition::new("inputs", OptionValue::Integer(2))
                    .with_description("Number of input pads")
                    .with_range(2.0, 16.0),
            )
            .option(
                OptionDefinition::new("duration", OptionValue::String("longest".to_string()))
                    .with_description("Stop at the longest or the shortest input")
                    .with_constraint(Constraint::OneOf(vec![
                        "longest".to_string(),
                        "shortest".to_string(),
                    ])),
            )
            .option(
                OptionDefinition::new("normalize", OptionValue::Boolean(true))
                    .with_description("Divide the sum by the number of contributing inputs"),
            )
            .dynamic_inputs()
            .build()
    }

    fn init(&mut self, options: &OptionValues) -> Result<(), ProcessingError> {
        let inputs = pad_count(options, "inputs")?;
        self.duration = match options.get_string("duration")? {
            "shortest" => MixDuration::Shortest,
            _ => MixDuration::Longest,
        };
        self.normalize = options.get_bool("normalize")?;
        self.queues = vec![VecDeque::new(); inputs];
        self.ended = vec![false; inputs];
        Ok(())
    }

    fn inputs(&self) -> Vec<PadDefinition> {
        numbered_pads("input", self.queues.len(), |name| PadDefinition::input(name))
    }

    fn negotiate(&self, inputs: &[FrameFormat]) -> Result<Vec<FrameFormat>, ProcessingError> {
        let first = inputs.first().copied().ok_or_else(|| {
            ProcessingError::UnsupportedFormat("mixer has no input format".to_string())
        })?;

        if let Some((pad, other)) = inputs.iter().enumerate().find(|(_, f)| **f != first) {
            return Err(ProcessingError::UnsupportedFormat(format!(
                "input {} carries {}, input 0 carries {}",
                pad, other, first
            )));
        }

        Ok(vec![first])
    }

    fn filter_frame(
        &mut self,
        pad: usize,
        frame: Frame,
        out: &mut FilterOutput,
    ) -> Result<(), ProcessingError> {
        let queue = self.queues.get_mut(pad).ok_or_else(|| {
            ProcessingError::Failed(format!("frame on unknown input pad {}", pad))
        })?;
        queue.push_back(frame);
        self.mix_ready(out)
    }

    fn end_of_input(&mut self, pad: usize, out: &mut FilterOutput) -> Result<(), ProcessingError> {
        if let Some(ended) = self.ended.get_mut(pad) {
            *ended = true;
        }
        if self.duration == MixDuration::Shortest {
            // Whatever the ended input contributed is already mixed.
            out.close(0);
        }
        self.mix_ready(out)
    }

    fn flush(&mut self, out: &mut FilterOutput) -> Result<(), ProcessingError> {
        self.ended.iter_mut().for_each(|e| *e = true);
        self.mix_ready(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pad::resolve_options;
    use std::collections::HashMap;

    const MONO: FrameFormat = FrameFormat::new(48_000, 1);

    fn init_with(filter: &mut dyn Filter, pairs: &[(&str, &str)]) {
        let staged: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let options = resolve_options(&filter.metadata().options, &staged).unwrap();
        filter.init(&options).unwrap();
    }

    fn mono(samples: &[f32]) -> Frame {
        Frame::new(MONO, samples.to_vec())
    }

    #[test]
    fn test_asplit_pad_count_follows_option() {
        let mut split = ASplit::default();
        init_with(&mut split, &[("outputs", "3")]);

        let pads = split.outputs();
        assert_eq!(pads.len(), 3);
        assert_eq!(pads[2].name, "output2");
    }

    #[test]
    fn test_asplit_shares_buffer_and_skips_closed() {
        let mut split = ASplit::default();
        init_with(&mut split, &[]);

        let frame = mono(&[1.0]);
        let mut out = FilterOutput::new(vec![false, true]);
        split.filter_frame(0, frame.clone(), &mut out).unwrap();

        let (frames, _) = out.into_parts();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].1.shares_buffer(&frame));
    }

    #[test]
    fn test_amix_waits_for_every_input() {
        let mut mix = AMix::default();
        init_with(&mut mix, &[]);

        let mut out = FilterOutput::with_outputs(1);
        mix.filter_frame(0, mono(&[1.0, 1.0]).with_pts(0), &mut out).unwrap();
        assert_eq!(out.emitted(), 0);

        mix.filter_frame(1, mono(&[0.0, 1.0]), &mut out).unwrap();
        let (frames, _) = out.into_parts();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1.samples(), &[0.5, 1.0]);
        assert_eq!(frames[0].1.pts(), Some(0));
    }

    #[test]
    fn test_amix_longest_drains_remaining_input() {
        let mut mix = AMix::default();
        init_with(&mut mix, &[("normalize", "false")]);

        let mut out = FilterOutput::with_outputs(1);
        mix.filter_frame(0, mono(&[1.0]), &mut out).unwrap();
        mix.filter_frame(0, mono(&[2.0]), &mut out).unwrap();
        mix.end_of_input(1, &mut out).unwrap();

        let (frames, closed) = out.into_parts();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].1.samples(), &[2.0]);
        assert_eq!(closed, vec![false]);
    }

    #[test]
    fn test_amix_shortest_stops_on_first_end() {
        let mut mix = AMix::default();
        init_with(&mut mix, &[("duration", "shortest")]);

        let mut out = FilterOutput::with_outputs(1);
        mix.filter_frame(0, mono(&[1.0]), &mut out).unwrap();
        mix.end_of_input(1, &mut out).unwrap();

        assert_eq!(out.emitted(), 0);
        assert!(out.is_closed(0));
    }

    #[test]
    fn test_amix_rejects_mismatched_formats() {
        let mut mix = AMix::default();
        init_with(&mut mix, &[("inputs", "3")]);

        assert_eq!(mix.inputs().len(), 3);
        assert!(mix.negotiate(&[MONO, MONO, MONO]).is_ok());
        assert!(matches!(
            mix.negotiate(&[MONO, FrameFormat::new(44_100, 1), MONO]),
            Err(ProcessingError::UnsupportedFormat(_))
        ));
    }
}
