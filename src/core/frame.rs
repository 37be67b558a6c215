//! Reference-counted frames.
//!
//! A frame is the unit of data flowing through the graph. The sample buffer
//! is shared behind an `Arc`, so cloning a frame is cheap and never copies
//! samples. Writers go through [`Frame::samples_mut`], which copies the
//! buffer first if anyone else still holds a reference.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stream format carried by a frame and negotiated on every link.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct FrameFormat {
    /// Samples per second per channel.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl FrameFormat {
    /// Create a new format.
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz/{}ch", self.sample_rate, self.channels)
    }
}

/// An opaque, cheaply cloneable media frame.
#[derive(Clone)]
pub struct Frame {
    format: FrameFormat,
    pts: Option<i64>,
    samples: Arc<Vec<f32>>,
}

impl Frame {
    /// Create a frame from interleaved samples.
    pub fn new(format: FrameFormat, samples: Vec<f32>) -> Self {
        Self {
            format,
            pts: None,
            samples: Arc::new(samples),
        }
    }

    /// Create a frame with no samples and no format.
    pub fn empty() -> Self {
        Self::new(FrameFormat::default(), Vec::new())
    }

    /// Set the presentation timestamp (in samples).
    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Format of this frame.
    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Presentation timestamp, if stamped.
    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    /// Set or clear the presentation timestamp.
    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mutable samples. Copies the buffer if it is shared.
    pub fn samples_mut(&mut self) -> &mut Vec<f32> {
        Arc::make_mut(&mut self.samples)
    }

    /// Number of samples per channel.
    pub fn sample_count(&self) -> usize {
        match self.format.channels {
            0 => 0,
            channels => self.samples.len() / channels as usize,
        }
    }

    /// Whether the frame carries no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of frames sharing this frame's sample buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.samples)
    }

    /// Whether two frames share the same sample buffer.
    pub fn shares_buffer(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    /// Drop this frame's reference to its buffer, leaving it empty.
    ///
    /// The frame itself stays usable as a slot to be filled again.
    pub fn unref(&mut self) {
        self.format = FrameFormat::default();
        self.pts = None;
        self.samples = Arc::new(Vec::new());
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("format", &self.format)
            .field("pts", &self.pts)
            .field("samples", &self.samples.len())
            .finish()
    }
}
