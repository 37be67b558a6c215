//! Push/pull runtime.
//!
//! Frames enter a configured graph through source feeds and leave through
//! sink slots. Nothing runs on push; pulling a sink drives the scheduler
//! one step at a time until the sink has a frame or no node can make
//! progress.

use crate::core::context::FilterOutput;
use crate::core::error::{FilterError, FilterResult, NodeId};
use crate::core::filter::{FilterRole, SinkStatus};
use crate::core::frame::Frame;
use crate::graph::node::{NodeState, Work};
use crate::graph::structure::FilterGraph;
use serde::{Deserialize, Serialize};

/// Frame flow counters for one graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStats {
    /// Frames accepted by `push_frame`.
    pub frames_pushed: u64,
    /// Frames handed out by `pull_frame`.
    pub frames_pulled: u64,
    /// Filter invocations made by the scheduler.
    pub steps: u64,
    /// Frames emitted on outputs that were already closed.
    pub frames_dropped: u64,
}

/// Outcome of pulling a sink.
#[derive(Debug)]
pub enum PullResult {
    /// A frame owned by the caller.
    Produced(Frame),
    /// Nothing available now. Either more input is needed or the stream
    /// has ended; see [`FilterGraph::is_exhausted`].
    NotReady,
    /// The pull could not be carried out.
    Failed(FilterError),
}

impl PullResult {
    /// Whether a frame was produced.
    pub fn is_produced(&self) -> bool {
        matches!(self, PullResult::Produced(_))
    }

    /// Whether no frame is available yet.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PullResult::NotReady)
    }

    /// The produced frame, if any.
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            PullResult::Produced(frame) => Some(frame),
            _ => None,
        }
    }

    /// Convert into a `Result`, with `NotReady` as `Ok(None)`.
    pub fn into_result(self) -> FilterResult<Option<Frame>> {
        match self {
            PullResult::Produced(frame) => Ok(Some(frame)),
            PullResult::NotReady => Ok(None),
            PullResult::Failed(error) => Err(error),
        }
    }
}

impl FilterGraph {
    fn runtime_node(&self, id: NodeId, role: FilterRole) -> FilterResult<usize> {
        if !self.is_configured() {
            return Err(FilterError::NotConfigured);
        }
        let index = self.index_of(id)?;
        let node = &self.nodes[index];
        if node.role() != role {
            return Err(FilterError::InvalidOperation {
                node: id,
                reason: format!(
                    "{} is a {} node, expected {}",
                    node.kind(),
                    node.role().display_name(),
                    role.display_name()
                ),
            });
        }
        Ok(index)
    }

    /// Queue a frame on a source, or signal end of stream with `None`.
    ///
    /// The caller keeps its own reference to the frame. No filter runs
    /// until a sink is pulled.
    ///
    /// Once every sink fed by this source has ended (a `head` node closed
    /// its output, for example) pulls no longer run the scheduler, so the
    /// feed stops draining. It then fills up to
    /// [`GraphOptions::source_queue_capacity`](crate::graph::structure::GraphOptions)
    /// and further pushes fail with a "feed is full" error.
    pub fn push_frame(&mut self, source: NodeId, frame: Option<&Frame>) -> FilterResult<()> {
        let index = self.runtime_node(source, FilterRole::Source)?;
        let capacity = self.options().source_queue_capacity;
        let expected = self.nodes[index]
            .outputs
            .first()
            .and_then(|port| port.link)
            .and_then(|link| self.links[link.0].format);

        let node = &mut self.nodes[index];
        if node.feed_ended {
            return Err(FilterError::Push {
                node: source,
                reason: "end of stream was already signalled".to_string(),
            });
        }

        let Some(frame) = frame else {
            log::debug!("end of stream on {}", source);
            node.feed_ended = true;
            return Ok(());
        };

        if node.feed.len() >= capacity {
            return Err(FilterError::Push {
                node: source,
                reason: format!("feed is full ({} frames)", capacity),
            });
        }
        if let Some(expected) = expected {
            if frame.format() != expected {
                return Err(FilterError::Push {
                    node: source,
                    reason: format!("frame is {}, link carries {}", frame.format(), expected),
                });
            }
        }

        node.feed.push_back(frame.clone());
        self.stats.frames_pushed += 1;
        log::trace!("queued {:?} on {}", frame, source);
        Ok(())
    }

    /// Pull the next frame out of a sink.
    pub fn pull_frame(&mut self, sink: NodeId) -> PullResult {
        match self.try_pull(sink) {
            Ok(Some(frame)) => PullResult::Produced(frame),
            Ok(None) => PullResult::NotReady,
            Err(error) => PullResult::Failed(error),
        }
    }

    fn try_pull(&mut self, sink: NodeId) -> FilterResult<Option<Frame>> {
        let index = self.runtime_node(sink, FilterRole::Sink)?;
        if let Some(failed) = self.failed_upstream(index) {
            return Err(FilterError::InvalidOperation {
                node: sink,
                reason: format!("{} failed earlier", failed),
            });
        }

        loop {
            let node = &mut self.nodes[index];
            let slot = node.slot.get_or_insert_with(Frame::empty);
            let status = node
                .filter
                .take_frame(slot)
                .map_err(|source| FilterError::Pull { node: sink, source })?;

            match status {
                SinkStatus::Ready => {
                    let frame = slot.clone();
                    slot.unref();
                    self.stats.frames_pulled += 1;
                    return Ok(Some(frame));
                }
                SinkStatus::EndOfStream => {
                    if !node.exhausted {
                        log::debug!("{} reached end of stream", sink);
                    }
                    node.exhausted = true;
                    return Ok(None);
                }
                SinkStatus::Again => {
                    if !self.run_once()? {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// The first failed node among `index` and everything feeding it.
    fn failed_upstream(&self, index: usize) -> Option<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![index];
        while let Some(i) = stack.pop() {
            if std::mem::replace(&mut seen[i], true) {
                continue;
            }
            let node = &self.nodes[i];
            if node.state == NodeState::Failed {
                return Some(node.id());
            }
            stack.extend(
                node.inputs
                    .iter()
                    .filter_map(|port| port.link)
                    .map(|link| self.links[link.0].from.node.index),
            );
        }
        None
    }

    /// Pull until `NotReady`, collecting every frame.
    pub fn drain(&mut self, sink: NodeId) -> FilterResult<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.pull_frame(sink).into_result()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Whether a sink has handed out its last frame.
    pub fn is_exhausted(&self, sink: NodeId) -> FilterResult<bool> {
        let index = self.runtime_node(sink, FilterRole::Sink)?;
        Ok(self.nodes[index].exhausted)
    }

    /// Perform one scheduler step.
    ///
    /// The first node in topological order with pending work processes one
    /// frame, one end of input or its flush. Returns `false` when no node
    /// has work.
    pub(crate) fn run_once(&mut self) -> FilterResult<bool> {
        let Some(index) = self
            .schedule
            .iter()
            .copied()
            .find(|&i| self.nodes[i].has_work())
        else {
            return Ok(false);
        };

        let node = &mut self.nodes[index];
        let id = node.id();
        if node.state == NodeState::Failed {
            return Err(FilterError::InvalidOperation {
                node: id,
                reason: "node failed earlier".to_string(),
            });
        }
        let Some(work) = node.take_work() else {
            return Ok(false);
        };

        let closed_before: Vec<bool> = node.outputs.iter().map(|p| p.closed).collect();
        let mut out = FilterOutput::new(closed_before.clone());
        log::trace!("step {}: {} ({}) {:?}", self.stats.steps, id, node.kind(), work);

        let result = match work {
            Work::Frame { pad, frame } => node.filter.filter_frame(pad, frame, &mut out),
            Work::EndOfInput(pad) => node.filter.end_of_input(pad, &mut out),
            Work::Flush => node.filter.flush(&mut out).map(|()| out.close_all()),
        };
        self.stats.steps += 1;

        if let Err(source) = result {
            node.state = NodeState::Failed;
            log::debug!("{} ({}) failed: {}", id, node.kind(), source);
            return Err(FilterError::Pull { node: id, source });
        }

        let (frames, closed) = out.into_parts();
        let mut deliveries = Vec::with_capacity(frames.len());
        for (pad, frame) in frames {
            if closed_before[pad] {
                self.stats.frames_dropped += 1;
                log::warn!("{} emitted on closed output {}; frame dropped", id, pad);
                continue;
            }
            if let Some(link) = node.outputs[pad].link {
                deliveries.push((link, frame));
            }
        }

        let mut ended = Vec::new();
        for (pad, now_closed) in closed.into_iter().enumerate() {
            if now_closed && !closed_before[pad] {
                node.outputs[pad].closed = true;
                if let Some(link) = node.outputs[pad].link {
                    ended.push(link);
                }
            }
        }

        for (link, frame) in deliveries {
            let to = self.links[link.0].to;
            self.nodes[to.node.index].inputs[to.pad].queue.push_back(frame);
        }
        for link in ended {
            let to = self.links[link.0].to;
            log::trace!("end of stream reaches {}", to);
            self.nodes[to.node.index].inputs[to.pad].eof = true;
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ProcessingError;
    use crate::core::filter::{Filter, FilterMetadata};
    use crate::core::frame::FrameFormat;
    use crate::core::pad::PadDefinition;
    use crate::filters::registry::{FilterRegistry, RegistryBuilder};
    use crate::graph::structure::GraphOptions;

    const STEREO: FrameFormat = FrameFormat::new(48_000, 2);

    fn node(graph: &mut FilterGraph, kind: &str, options: &[(&str, &str)]) -> NodeId {
        let id = graph.allocate_node(kind).unwrap();
        for (key, value) in options {
            graph.set_option(id, *key, *value).unwrap();
        }
        graph.initialize(id).unwrap();
        id
    }

    /// buffer -> buffersink, configured.
    fn passthrough() -> (FilterGraph, NodeId, NodeId) {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let src = node(&mut graph, "buffer", &[]);
        let sink = node(&mut graph, "buffersink", &[]);
        graph.link(src, 0, sink, 0).unwrap();
        graph.configure().unwrap();
        (graph, src, sink)
    }

    fn stereo(value: f32) -> Frame {
        Frame::new(STEREO, vec![value; 8])
    }

    #[test]
    fn test_push_pull_round_trip() {
        let (mut graph, src, sink) = passthrough();
        let frame = stereo(0.5).with_pts(100);

        graph.push_frame(src, Some(&frame)).unwrap();
        assert_eq!(frame.ref_count(), 2);

        let pulled = graph.pull_frame(sink).into_result().unwrap().unwrap();
        assert_eq!(pulled.samples(), frame.samples());
        assert_eq!(pulled.pts(), Some(100));
        assert!(graph.pull_frame(sink).is_not_ready());
        assert!(!graph.is_exhausted(sink).unwrap());
    }

    #[test]
    fn test_runtime_requires_configuration() {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let src = node(&mut graph, "buffer", &[]);
        let sink = node(&mut graph, "buffersink", &[]);
        graph.link(src, 0, sink, 0).unwrap();

        assert!(matches!(
            graph.push_frame(src, Some(&stereo(0.0))),
            Err(FilterError::NotConfigured)
        ));
        assert!(matches!(
            graph.pull_frame(sink),
            PullResult::Failed(FilterError::NotConfigured)
        ));
    }

    #[test]
    fn test_roles_are_enforced() {
        let (mut graph, src, sink) = passthrough();

        assert!(matches!(
            graph.push_frame(sink, Some(&stereo(0.0))),
            Err(FilterError::InvalidOperation { .. })
        ));
        assert!(matches!(
            graph.pull_frame(src),
            PullResult::Failed(FilterError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_not_ready_until_relevant_push() {
        let (mut graph, src, sink) = passthrough();

        for _ in 0..3 {
            assert!(graph.pull_frame(sink).is_not_ready());
        }
        assert_eq!(graph.stats().steps, 0);

        graph.push_frame(src, Some(&stereo(1.0))).unwrap();
        assert!(graph.pull_frame(sink).is_produced());
    }

    #[test]
    fn test_produced_frame_is_independent_of_slot() {
        let (mut graph, src, sink) = passthrough();
        assert!(!graph.node(sink).unwrap().has_slot());

        let frame = stereo(1.0);
        graph.push_frame(src, Some(&frame)).unwrap();
        let mut pulled = graph.pull_frame(sink).into_result().unwrap().unwrap();

        let sink_node = graph.node(sink).unwrap();
        assert!(sink_node.has_slot());
        assert_eq!(sink_node.queued_frames(), 0);
        assert!(pulled.shares_buffer(&frame));
        assert_eq!(frame.ref_count(), 2);

        pulled.samples_mut()[0] = 0.0;
        assert_eq!(frame.samples()[0], 1.0);
    }

    #[test]
    fn test_end_of_stream_propagates() {
        let (mut graph, src, sink) = passthrough();
        graph.push_frame(src, Some(&stereo(1.0))).unwrap();
        graph.push_frame(src, None).unwrap();

        assert!(matches!(
            graph.push_frame(src, Some(&stereo(1.0))),
            Err(FilterError::Push { .. })
        ));
        assert!(matches!(graph.push_frame(src, None), Err(FilterError::Push { .. })));

        assert_eq!(graph.drain(sink).unwrap().len(), 1);
        assert!(graph.is_exhausted(sink).unwrap());
        assert!(graph.pull_frame(sink).is_not_ready());
    }

    #[test]
    fn test_push_checks_format_and_capacity() {
        let mut graph = FilterGraph::with_options(
            FilterRegistry::shared(),
            GraphOptions::new().with_source_queue_capacity(2),
        )
        .unwrap();
        let src = node(&mut graph, "buffer", &[]);
        let sink = node(&mut graph, "buffersink", &[]);
        graph.link(src, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        let mono = Frame::new(FrameFormat::new(48_000, 1), vec![0.0; 4]);
        assert!(matches!(
            graph.push_frame(src, Some(&mono)),
            Err(FilterError::Push { .. })
        ));

        graph.push_frame(src, Some(&stereo(0.0))).unwrap();
        graph.push_frame(src, Some(&stereo(0.0))).unwrap();
        assert!(matches!(
            graph.push_frame(src, Some(&stereo(0.0))),
            Err(FilterError::Push { .. })
        ));
        assert_eq!(graph.stats().frames_pushed, 2);

        assert!(graph.pull_frame(sink).is_produced());
        graph.push_frame(src, Some(&stereo(0.0))).unwrap();
    }

    #[test]
    fn test_chain_with_split_and_mix() {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let src = node(&mut graph, "buffer", &[("channels", "1")]);
        let split = node(&mut graph, "asplit", &[]);
        let quiet = node(&mut graph, "volume", &[("volume", "0")]);
        let mix = node(&mut graph, "amix", &[("normalize", "false")]);
        let sink = node(&mut graph, "buffersink", &[]);
        graph.link(src, 0, split, 0).unwrap();
        graph.link(split, 0, quiet, 0).unwrap();
        graph.link(split, 1, mix, 1).unwrap();
        graph.link(quiet, 0, mix, 0).unwrap();
        graph.link(mix, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        let frame = Frame::new(FrameFormat::new(48_000, 1), vec![0.25, 0.5]);
        graph.push_frame(src, Some(&frame)).unwrap();
        graph.push_frame(src, None).unwrap();

        let frames = graph.drain(sink).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples(), &[0.25, 0.5]);
        assert_eq!(frames[0].pts(), Some(0));
        assert!(graph.is_exhausted(sink).unwrap());

        // The volume node wrote to a private copy.
        assert_eq!(frame.samples(), &[0.25, 0.5]);
    }

    #[test]
    fn test_head_ends_stream_early() {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let src = node(&mut graph, "buffer", &[]);
        let head = node(&mut graph, "head", &[("frames", "2")]);
        let sink = node(&mut graph, "buffersink", &[]);
        graph.link(src, 0, head, 0).unwrap();
        graph.link(head, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        for i in 0..4 {
            graph.push_frame(src, Some(&stereo(i as f32))).unwrap();
        }

        let frames = graph.drain(sink).unwrap();
        assert_eq!(frames.len(), 2);
        assert!(graph.is_exhausted(sink).unwrap());
        assert_eq!(frames[1].pts(), Some(4));
    }

    #[test]
    fn test_feed_fills_once_downstream_has_ended() {
        let mut graph = FilterGraph::with_options(
            FilterRegistry::shared(),
            GraphOptions::new().with_source_queue_capacity(2),
        )
        .unwrap();
        let src = node(&mut graph, "buffer", &[]);
        let head = node(&mut graph, "head", &[("frames", "1")]);
        let sink = node(&mut graph, "buffersink", &[]);
        graph.link(src, 0, head, 0).unwrap();
        graph.link(head, 0, sink, 0).unwrap();
        graph.configure().unwrap();

        graph.push_frame(src, Some(&stereo(1.0))).unwrap();
        assert!(graph.pull_frame(sink).is_produced());
        assert!(graph.drain(sink).unwrap().is_empty());
        assert!(graph.is_exhausted(sink).unwrap());

        graph.push_frame(src, Some(&stereo(2.0))).unwrap();
        graph.push_frame(src, Some(&stereo(3.0))).unwrap();
        assert!(graph.pull_frame(sink).is_not_ready());
        assert_eq!(graph.node(src).unwrap().queued_frames(), 2);
        assert!(matches!(
            graph.push_frame(src, Some(&stereo(4.0))),
            Err(FilterError::Push { .. })
        ));
    }

    /// Rejects every frame.
    struct Faulty;

    impl Filter for Faulty {
        fn metadata(&self) -> FilterMetadata {
            FilterMetadata::builder("faulty")
                .input(PadDefinition::input("default"))
                .output(PadDefinition::output("default"))
                .build()
        }

        fn filter_frame(
            &mut self,
            _pad: usize,
            _frame: Frame,
            _out: &mut FilterOutput,
        ) -> Result<(), ProcessingError> {
            Err(ProcessingError::Failed("corrupt frame".to_string()))
        }
    }

    /// Forwards every frame and closes its output after the first.
    struct CloseAfterFirst;

    impl Filter for CloseAfterFirst {
        fn metadata(&self) -> FilterMetadata {
            FilterMetadata::builder("closeafterfirst")
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
            out.emit(0, frame)?;
            out.close(0);
            Ok(())
        }
    }

    /// buffer -> `kind` -> buffersink, configured.
    fn through(kind: &str) -> (FilterGraph, NodeId, NodeId, NodeId) {
        let registry = RegistryBuilder::new()
            .register(|| Box::new(Faulty))
            .register(|| Box::new(CloseAfterFirst))
            .build();
        let mut graph = FilterGraph::create(registry).unwrap();
        let src = node(&mut graph, "buffer", &[]);
        let mid = node(&mut graph, kind, &[]);
        let sink = node(&mut graph, "buffersink", &[]);
        graph.link(src, 0, mid, 0).unwrap();
        graph.link(mid, 0, sink, 0).unwrap();
        graph.configure().unwrap();
        (graph, src, mid, sink)
    }

    #[test]
    fn test_filter_error_fails_the_pull() {
        let (mut graph, src, faulty, sink) = through("faulty");
        graph.push_frame(src, Some(&stereo(1.0))).unwrap();

        match graph.pull_frame(sink) {
            PullResult::Failed(FilterError::Pull { node, source }) => {
                assert_eq!(node, faulty);
                assert_eq!(source, ProcessingError::Failed("corrupt frame".to_string()));
            }
            other => panic!("expected a failed pull, got {:?}", other),
        }
        assert_eq!(graph.node(faulty).unwrap().state(), NodeState::Failed);

        // Later pulls keep failing instead of reporting NotReady.
        graph.push_frame(src, Some(&stereo(2.0))).unwrap();
        for _ in 0..2 {
            match graph.pull_frame(sink) {
                PullResult::Failed(FilterError::InvalidOperation { node, reason }) => {
                    assert_eq!(node, sink);
                    assert!(reason.contains(&faulty.to_string()));
                }
                other => panic!("expected a failed pull, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_frames_after_close_are_dropped() {
        let (mut graph, src, _closer, sink) = through("closeafterfirst");
        graph.push_frame(src, Some(&stereo(1.0))).unwrap();
        graph.push_frame(src, Some(&stereo(2.0))).unwrap();

        let frames = graph.drain(sink).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples()[0], 1.0);
        assert_eq!(graph.stats().frames_dropped, 1);
        assert!(graph.is_exhausted(sink).unwrap());
    }

    #[test]
    fn test_destroy_releases_queued_frames() {
        let (mut graph, src, _sink) = passthrough();
        let frame = stereo(1.0);
        graph.push_frame(src, Some(&frame)).unwrap();
        assert_eq!(frame.ref_count(), 2);

        graph.destroy();
        assert_eq!(frame.ref_count(), 1);
    }
}
