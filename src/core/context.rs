//! Output context handed to filters while they process.
//!
//! A filter never touches its neighbours directly. It emits frames and
//! closes output pads through a [`FilterOutput`]; the graph routes what
//! was collected once the filter call returns.

use crate::core::error::ProcessingError;
use crate::core::frame::Frame;

/// Collects what a filter produced during one invocation.
#[derive(Debug)]
pub struct FilterOutput {
    /// Frames emitted, in emission order, tagged with the output pad.
    frames: Vec<(usize, Frame)>,
    /// Per-pad closed flags (includes pads closed by earlier calls).
    closed: Vec<bool>,
}

impl FilterOutput {
    /// Create a context for a node whose output pads are in the given
    /// closed state.
    pub fn new(closed: Vec<bool>) -> Self {
        Self {
            frames: Vec::new(),
            closed,
        }
    }

    /// Create a context with `count` open output pads.
    pub fn with_outputs(count: usize) -> Self {
        Self::new(vec![false; count])
    }

    /// Number of output pads.
    pub fn output_count(&self) -> usize {
        self.closed.len()
    }

    /// Emit a frame on an output pad.
    ///
    /// Frames emitted on a closed pad are accepted and later dropped.
    pub fn emit(&mut self, pad: usize, frame: Frame) -> Result<(), ProcessingError> {
        if pad >= self.closed.len() {
            return Err(ProcessingError::NoSuchOutput {
                pad,
                count: self.closed.len(),
            });
        }
        self.frames.push((pad, frame));
        Ok(())
    }

    /// Signal end of stream on one output pad.
    pub fn close(&mut self, pad: usize) {
        if let Some(closed) = self.closed.get_mut(pad) {
            *closed = true;
        }
    }

    /// Signal end of stream on every output pad.
    pub fn close_all(&mut self) {
        self.closed.iter_mut().for_each(|c| *c = true);
    }

    /// Whether an output pad is closed.
    pub fn is_closed(&self, pad: usize) -> bool {
        self.closed.get(pad).copied().unwrap_or(true)
    }

    /// Whether every output pad is closed.
    pub fn all_closed(&self) -> bool {
        self.closed.iter().all(|c| *c)
    }

    /// Number of frames collected so far.
    pub fn emitted(&self) -> usize {
        self.frames.len()
    }

    /// Take everything collected: emitted frames and final closed flags.
    pub fn into_parts(self) -> (Vec<(usize, Frame)>, Vec<bool>) {
        (self.frames, self.closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_checks_pad_range() {
        let mut out = FilterOutput::with_outputs(1);
        assert!(out.emit(0, Frame::empty()).is_ok());
        assert_eq!(
            out.emit(1, Frame::empty()),
            Err(ProcessingError::NoSuchOutput { pad: 1, count: 1 })
        );
        assert_eq!(out.emitted(), 1);
    }

    #[test]
    fn test_close_tracking() {
        let mut out = FilterOutput::new(vec![true, false]);
        assert!(out.is_closed(0));
        assert!(!out.all_closed());

        out.close(1);
        assert!(out.all_closed());

        let (frames, closed) = out.into_parts();
        assert!(frames.is_empty());
        assert_eq!(closed, vec![true, true]);
    }

    #[test]
    fn test_out_of_range_pad_reads_closed() {
        let out = FilterOutput::with_outputs(0);
        assert!(out.is_closed(3));
        assert!(out.all_closed());
    }
}
