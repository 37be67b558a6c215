//! Graph-owned node wrapper.
//!
//! A [`FilterNode`] owns one filter instance together with everything the
//! graph tracks about it: lifecycle state, staged options, pad ports and
//! the runtime queues used while frames flow.

use crate::core::context::FilterOutput;
use crate::core::error::{FilterError, FilterResult, LinkId, NodeId, ProcessingError};
use crate::core::filter::{Filter, FilterMetadata, FilterRole};
use crate::core::frame::Frame;
use crate::core::pad::{resolve_options, PadDefinition, PadDirection};
use crate::core::types::OptionValues;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Created; options may be staged.
    Allocated,
    /// Options applied and pads created.
    Initialized,
    /// Initialization or processing failed; the node is unusable.
    Failed,
    /// Removed from the graph. Its slot stays so other handles keep
    /// their indices.
    Discarded,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Allocated => write!(f, "allocated"),
            NodeState::Initialized => write!(f, "initialized"),
            NodeState::Failed => write!(f, "failed"),
            NodeState::Discarded => write!(f, "discarded"),
        }
    }
}

/// Input side of a pad.
#[derive(Debug, Clone)]
pub(crate) struct InputPort {
    pub definition: PadDefinition,
    pub link: Option<LinkId>,
    /// Frames routed here and not yet handed to the filter.
    pub queue: VecDeque<Frame>,
    /// Upstream closed the link.
    pub eof: bool,
    /// The filter has been told about `eof`.
    pub eof_delivered: bool,
}

/// Output side of a pad.
#[derive(Debug, Clone)]
pub(crate) struct OutputPort {
    pub definition: PadDefinition,
    pub link: Option<LinkId>,
    pub closed: bool,
}

/// One unit of scheduler work for a node.
#[derive(Debug)]
pub(crate) enum Work {
    Frame { pad: usize, frame: Frame },
    EndOfInput(usize),
    Flush,
}

/// Stands in for the filter of a discarded node.
struct Tombstone;

impl Filter for Tombstone {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder("discarded").build()
    }

    fn filter_frame(
        &mut self,
        _pad: usize,
        _frame: Frame,
        _out: &mut FilterOutput,
    ) -> Result<(), ProcessingError> {
        Err(ProcessingError::Unsupported("filter_frame on a discarded node".to_string()))
    }
}

/// A node owned by a [`FilterGraph`](crate::graph::FilterGraph).
pub struct FilterNode {
    id: NodeId,
    metadata: FilterMetadata,
    pub(crate) filter: Box<dyn Filter>,
    pub(crate) state: NodeState,
    staged: HashMap<String, String>,
    applied: OptionValues,
    pub(crate) inputs: Vec<InputPort>,
    pub(crate) outputs: Vec<OutputPort>,
    /// External feed of a source node.
    pub(crate) feed: VecDeque<Frame>,
    pub(crate) feed_ended: bool,
    /// Reusable output slot of a sink node, created on first pull.
    pub(crate) slot: Option<Frame>,
    pub(crate) exhausted: bool,
    pub(crate) flushed: bool,
}

impl fmt::Debug for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterNode")
            .field("id", &self.id)
            .field("kind", &self.metadata.name)
            .field("state", &self.state)
            .field("staged", &self.staged)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .finish_non_exhaustive()
    }
}

impl FilterNode {
    pub(crate) fn new(id: NodeId, filter: Box<dyn Filter>) -> Self {
        let metadata = filter.metadata();
        Self {
            id,
            metadata,
            filter,
            state: NodeState::Allocated,
            staged: HashMap::new(),
            applied: OptionValues::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            feed: VecDeque::new(),
            feed_ended: false,
            slot: None,
            exhausted: false,
            flushed: false,
        }
    }

    /// Handle of this node.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Kind name this node was created from.
    pub fn kind(&self) -> &str {
        &self.metadata.name
    }

    /// Metadata of the kind.
    pub fn metadata(&self) -> &FilterMetadata {
        &self.metadata
    }

    /// Boundary role of the kind.
    pub fn role(&self) -> FilterRole {
        self.metadata.role
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Whether `initialize` succeeded.
    pub fn is_initialized(&self) -> bool {
        self.state == NodeState::Initialized
    }

    /// Whether the node still occupies a live arena slot.
    pub fn is_live(&self) -> bool {
        self.state != NodeState::Discarded
    }

    /// Options staged and not yet applied.
    pub fn staged_options(&self) -> &HashMap<String, String> {
        &self.staged
    }

    /// Options resolved by a successful `initialize`.
    pub fn applied_options(&self) -> &OptionValues {
        &self.applied
    }

    /// Number of input pads (zero before initialization).
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output pads (zero before initialization).
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Pad definition by direction and index.
    pub fn pad(&self, direction: PadDirection, index: usize) -> Option<&PadDefinition> {
        match direction {
            PadDirection::Input => self.inputs.get(index).map(|p| &p.definition),
            PadDirection::Output => self.outputs.get(index).map(|p| &p.definition),
        }
    }

    /// Link attached to a pad, if any.
    pub fn pad_link(&self, direction: PadDirection, index: usize) -> Option<LinkId> {
        match direction {
            PadDirection::Input => self.inputs.get(index).and_then(|p| p.link),
            PadDirection::Output => self.outputs.get(index).and_then(|p| p.link),
        }
    }

    /// Whether the sink slot has been created.
    pub fn has_slot(&self) -> bool {
        self.slot.is_some()
    }

    /// Stage an option for the next `initialize`. Last write wins.
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) -> FilterResult<()> {
        if self.state != NodeState::Allocated {
            return Err(FilterError::InvalidOperation {
                node: self.id,
                reason: format!("cannot set options on a {} node", self.state),
            });
        }
        self.staged.insert(key.into(), value.into());
        Ok(())
    }

    /// Apply the staged options and create the pads.
    ///
    /// The staged set is consumed whether or not this succeeds. On failure
    /// the node is left `Failed` and has to be discarded.
    pub fn initialize(&mut self) -> FilterResult<()> {
        if self.state != NodeState::Allocated {
            return Err(FilterError::InvalidOperation {
                node: self.id,
                reason: format!("cannot initialize a {} node", self.state),
            });
        }

        let staged = std::mem::take(&mut self.staged);
        match self.apply(&staged) {
            Ok(()) => {
                self.state = NodeState::Initialized;
                log::debug!(
                    "initialized {} ({}) with {} in / {} out",
                    self.id,
                    self.kind(),
                    self.inputs.len(),
                    self.outputs.len()
                );
                Ok(())
            }
            Err(source) => {
                self.state = NodeState::Failed;
                log::debug!("failed to initialize {} ({}): {}", self.id, self.kind(), source);
                Err(FilterError::Initialization {
                    node: self.id,
                    kind: self.metadata.name.clone(),
                    source,
                })
            }
        }
    }

    /// Release the filter instance and everything queued, leaving a
    /// tombstone. Only nodes that were never linked may be discarded.
    pub(crate) fn discard(&mut self) -> FilterResult<()> {
        if self.state == NodeState::Initialized || self.state == NodeState::Discarded {
            return Err(FilterError::InvalidOperation {
                node: self.id,
                reason: format!("cannot discard a {} node", self.state),
            });
        }

        log::debug!("discarding {} ({}), was {}", self.id, self.kind(), self.state);
        self.filter = Box::new(Tombstone);
        self.state = NodeState::Discarded;
        self.staged.clear();
        self.applied = OptionValues::new();
        self.inputs.clear();
        self.outputs.clear();
        self.feed.clear();
        self.slot = None;
        Ok(())
    }

    fn apply(&mut self, staged: &HashMap<String, String>) -> Result<(), ProcessingError> {
        let values = resolve_options(&self.metadata.options, staged)?;
        self.filter.init(&values)?;

        self.inputs = self
            .filter
            .inputs()
            .into_iter()
            .map(|definition| InputPort {
                definition,
                link: None,
                queue: VecDeque::new(),
                eof: false,
                eof_delivered: false,
            })
            .collect();
        self.outputs = self
            .filter
            .outputs()
            .into_iter()
            .map(|definition| OutputPort {
                definition,
                link: None,
                closed: false,
            })
            .collect();
        self.applied = values;
        Ok(())
    }

    /// Whether there is anything for the scheduler to do here.
    pub(crate) fn has_work(&self) -> bool {
        if self.role() == FilterRole::Source {
            return !self.feed.is_empty() || (self.feed_ended && !self.flushed);
        }
        self.inputs
            .iter()
            .any(|p| !p.queue.is_empty() || (p.eof && !p.eof_delivered))
            || self.ready_to_flush()
    }

    fn ready_to_flush(&self) -> bool {
        !self.flushed && !self.inputs.is_empty() && self.inputs.iter().all(|p| p.eof_delivered)
    }

    /// Take the next unit of work. Queued frames go before end of input.
    pub(crate) fn take_work(&mut self) -> Option<Work> {
        if self.role() == FilterRole::Source {
            if let Some(frame) = self.feed.pop_front() {
                return Some(Work::Frame { pad: 0, frame });
            }
            if self.feed_ended && !self.flushed {
                self.flushed = true;
                return Some(Work::Flush);
            }
            return None;
        }

        for (pad, port) in self.inputs.iter_mut().enumerate() {
            if let Some(frame) = port.queue.pop_front() {
                return Some(Work::Frame { pad, frame });
            }
        }
        for (pad, port) in self.inputs.iter_mut().enumerate() {
            if port.eof && !port.eof_delivered {
                port.eof_delivered = true;
                return Some(Work::EndOfInput(pad));
            }
        }
        if self.ready_to_flush() {
            self.flushed = true;
            return Some(Work::Flush);
        }
        None
    }

    /// Frames held by this node's queues, feed and slot.
    pub fn queued_frames(&self) -> usize {
        self.feed.len()
            + self.inputs.iter().map(|p| p.queue.len()).sum::<usize>()
            + usize::from(self.slot.as_ref().is_some_and(|s| !s.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GraphId;
    use crate::filters::builtin::{ASplit, Anull, Volume};
    use proptest::prelude::*;

    fn node(filter: Box<dyn Filter>) -> FilterNode {
        FilterNode::new(NodeId::new(GraphId::new(), 0), filter)
    }

    #[test]
    fn test_initialize_applies_staged_and_clears() {
        let mut n = node(Box::new(Volume::default()));
        n.set_option("volume", "0.5").unwrap();
        assert_eq!(n.staged_options().len(), 1);

        n.initialize().unwrap();

        assert!(n.staged_options().is_empty());
        assert_eq!(n.applied_options().get_float("volume").unwrap(), 0.5);
        assert_eq!(n.state(), NodeState::Initialized);
        assert_eq!((n.input_count(), n.output_count()), (1, 1));
    }

    #[test]
    fn test_failed_initialize_clears_and_fails_node() {
        let mut n = node(Box::new(Volume::default()));
        n.set_option("gain", "2").unwrap();

        let err = n.initialize().unwrap_err();
        assert!(matches!(
            err,
            FilterError::Initialization { source: ProcessingError::UnknownOption(_), .. }
        ));
        assert!(n.staged_options().is_empty());
        assert_eq!(n.state(), NodeState::Failed);

        assert!(matches!(
            n.initialize(),
            Err(FilterError::InvalidOperation { .. })
        ));
        assert!(matches!(
            n.set_option("volume", "1"),
            Err(FilterError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_set_option_after_initialize_is_rejected() {
        let mut n = node(Box::new(Anull));
        n.initialize().unwrap();

        assert!(matches!(
            n.set_option("anything", "1"),
            Err(FilterError::InvalidOperation { .. })
        ));
        assert!(n.staged_options().is_empty());
        assert!(n.applied_options().is_empty());
    }

    #[test]
    fn test_pads_follow_options() {
        let mut n = node(Box::new(ASplit::default()));
        n.set_option("outputs", "4").unwrap();
        n.initialize().unwrap();

        assert_eq!(n.output_count(), 4);
        assert_eq!(n.pad(PadDirection::Output, 3).unwrap().name, "output3");
        assert!(n.pad(PadDirection::Output, 4).is_none());
    }

    #[test]
    fn test_work_order_frames_before_eof() {
        let mut n = node(Box::new(Anull));
        n.initialize().unwrap();
        n.inputs[0].queue.push_back(Frame::empty());
        n.inputs[0].eof = true;

        assert!(matches!(n.take_work(), Some(Work::Frame { pad: 0, .. })));
        assert!(matches!(n.take_work(), Some(Work::EndOfInput(0))));
        assert!(matches!(n.take_work(), Some(Work::Flush)));
        assert!(n.take_work().is_none());
        assert!(!n.has_work());
    }

    #[test]
    fn test_discard_releases_filter() {
        let mut n = node(Box::new(Volume::default()));
        n.set_option("volume", "loud").unwrap();
        assert!(n.initialize().is_err());

        n.discard().unwrap();
        assert_eq!(n.state(), NodeState::Discarded);
        assert!(!n.is_live());
        assert_eq!(n.kind(), "volume");
        assert!(matches!(n.discard(), Err(FilterError::InvalidOperation { .. })));

        let mut ready = node(Box::new(Anull));
        ready.initialize().unwrap();
        assert!(matches!(ready.discard(), Err(FilterError::InvalidOperation { .. })));
        assert!(ready.is_live());
    }

    proptest! {
        #[test]
        fn prop_last_staged_value_is_applied(values in prop::collection::vec(0.0f64..16.0, 1..8)) {
            let mut n = node(Box::new(Volume::default()));
            for value in &values {
                n.set_option("volume", value.to_string()).unwrap();
            }
            prop_assert_eq!(n.staged_options().len(), 1);

            n.initialize().unwrap();

            prop_assert!(n.staged_options().is_empty());
            let applied = n.applied_options().get_float("volume").unwrap();
            prop_assert_eq!(applied, *values.last().unwrap());
        }

        #[test]
        fn prop_staged_set_is_cleared_on_failure(key in "[a-z]{1,8}") {
            prop_assume!(key != "volume");
            let mut n = node(Box::new(Volume::default()));
            n.set_option(key, "1").unwrap();

            prop_assert!(n.initialize().is_err());
            prop_assert!(n.staged_options().is_empty());
        }
    }
}
