//! Graph structure and node management.
//!
//! The FilterGraph is the central data structure that owns all nodes and
//! the links between them. It uses a centralized arena for:
//! - Stable node handles (an index never moves)
//! - Graph-wide validation
//! - Teardown in one place

use crate::core::error::{FilterError, FilterResult, GraphId, LinkError, LinkId, NodeId};
use crate::core::filter::FilterRole;
use crate::core::pad::PadDirection;
use crate::execution::engine::FlowStats;
use crate::filters::registry::FilterRegistry;
use crate::graph::connection::{Endpoint, Link};
use crate::graph::node::FilterNode;
use crate::validation::ValidationPipeline;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Graph-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphOptions {
    /// Frames a source may hold before `push_frame` refuses more.
    pub source_queue_capacity: usize,
    /// Node and link slots reserved up front.
    pub initial_capacity: usize,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            source_queue_capacity: 64,
            initial_capacity: 8,
        }
    }
}

impl GraphOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-source queue capacity.
    pub fn with_source_queue_capacity(mut self, capacity: usize) -> Self {
        self.source_queue_capacity = capacity;
        self
    }

    /// Set the number of node and link slots reserved at creation.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

/// The processing graph.
///
/// Nodes and links live in arenas indexed by construction order. Once
/// `configure` succeeds the topology is frozen and frames may flow.
pub struct FilterGraph {
    id: GraphId,
    registry: Arc<FilterRegistry>,
    options: GraphOptions,
    pub(crate) nodes: Vec<FilterNode>,
    pub(crate) links: Vec<Link>,
    configured: bool,
    /// Node indices in topological order, fixed by `configure`.
    pub(crate) schedule: Vec<usize>,
    pub(crate) stats: FlowStats,
}

impl fmt::Debug for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterGraph")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("nodes", &self.nodes)
            .field("links", &self.links)
            .field("configured", &self.configured)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn allocation_error(what: &str, err: std::collections::TryReserveError) -> FilterError {
    FilterError::Allocation(format!("{}: {}", what, err))
}

impl FilterGraph {
    /// Create an empty graph with default options.
    pub fn create(registry: Arc<FilterRegistry>) -> FilterResult<Self> {
        Self::with_options(registry, GraphOptions::default())
    }

    /// Create an empty graph.
    pub fn with_options(registry: Arc<FilterRegistry>, options: GraphOptions) -> FilterResult<Self> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve(options.initial_capacity)
            .map_err(|e| allocation_error("node arena", e))?;
        let mut links = Vec::new();
        links
            .try_reserve(options.initial_capacity)
            .map_err(|e| allocation_error("link arena", e))?;

        let id = GraphId::new();
        log::debug!("created graph {}", id);

        Ok(Self {
            id,
            registry,
            options,
            nodes,
            links,
            configured: false,
            schedule: Vec::new(),
            stats: FlowStats::default(),
        })
    }

    /// Identity of this graph.
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Registry nodes are created from.
    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }

    /// Graph-wide settings.
    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    /// Whether `configure` has succeeded.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Frame flow counters.
    pub fn stats(&self) -> FlowStats {
        self.stats
    }

    // ========================================================================
    // Node Management
    // ========================================================================

    /// Create a node of the named kind.
    pub fn allocate_node(&mut self, kind: &str) -> FilterResult<NodeId> {
        if self.configured {
            return Err(FilterError::AlreadyConfigured);
        }

        let entry = self
            .registry
            .lookup(kind)
            .ok_or_else(|| FilterError::UnknownKind {
                name: kind.to_string(),
            })?;
        let filter = (entry.factory)();

        self.nodes
            .try_reserve(1)
            .map_err(|e| allocation_error("node arena", e))?;
        let id = NodeId::new(self.id, self.nodes.len());
        self.nodes.push(FilterNode::new(id, filter));

        log::debug!("allocated {} ({}) in graph {}", id, kind, self.id);
        Ok(id)
    }

    pub(crate) fn index_of(&self, id: NodeId) -> FilterResult<usize> {
        match self.nodes.get(id.index) {
            Some(node) if id.graph == self.id && node.is_live() => Ok(id.index),
            _ => Err(FilterError::NodeNotFound(id)),
        }
    }

    /// Remove a node that failed to initialize or was never initialized.
    ///
    /// The filter instance is released at once. The arena slot is kept as
    /// a tombstone, so other handles stay valid while this one is
    /// rejected from now on.
    pub fn discard_node(&mut self, id: NodeId) -> FilterResult<()> {
        if self.configured {
            return Err(FilterError::AlreadyConfigured);
        }
        let index = self.index_of(id)?;
        self.nodes[index].discard()
    }

    /// Get a reference to a node.
    pub fn node(&self, id: NodeId) -> FilterResult<&FilterNode> {
        let index = self.index_of(id)?;
        Ok(&self.nodes[index])
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, id: NodeId) -> FilterResult<&mut FilterNode> {
        let index = self.index_of(id)?;
        Ok(&mut self.nodes[index])
    }

    /// Stage an option on a node.
    pub fn set_option(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> FilterResult<()> {
        self.node_mut(id)?.set_option(key, value)
    }

    /// Initialize a node with its staged options.
    pub fn initialize(&mut self, id: NodeId) -> FilterResult<()> {
        self.node_mut(id)?.initialize()
    }

    /// All live nodes in construction order.
    pub fn nodes(&self) -> impl Iterator<Item = &FilterNode> {
        self.nodes.iter().filter(|n| n.is_live())
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes().count()
    }

    /// Nodes with the source role.
    pub fn sources(&self) -> Vec<NodeId> {
        self.nodes_with_role(FilterRole::Source)
    }

    /// Nodes with the sink role.
    pub fn sinks(&self) -> Vec<NodeId> {
        self.nodes_with_role(FilterRole::Sink)
    }

    fn nodes_with_role(&self, role: FilterRole) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| n.role() == role)
            .map(|n| n.id())
            .collect()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes().next().is_none()
    }

    // ========================================================================
    // Link Management
    // ========================================================================

    /// Link an output pad of `src` to an input pad of `dst`.
    pub fn link(
        &mut self,
        src: NodeId,
        output_pad: usize,
        dst: NodeId,
        input_pad: usize,
    ) -> FilterResult<LinkId> {
        if self.configured {
            return Err(FilterError::AlreadyConfigured);
        }
        let si = self.index_of(src)?;
        let di = self.index_of(dst)?;

        for (index, id) in [(si, src), (di, dst)] {
            if !self.nodes[index].is_initialized() {
                return Err(LinkError::NotInitialized(id).into());
            }
        }

        let from = &self.nodes[si];
        if output_pad >= from.output_count() {
            return Err(LinkError::PadOutOfRange {
                node: src,
                direction: PadDirection::Output,
                pad: output_pad,
                count: from.output_count(),
            }
            .into());
        }
        let to = &self.nodes[di];
        if input_pad >= to.input_count() {
            return Err(LinkError::PadOutOfRange {
                node: dst,
                direction: PadDirection::Input,
                pad: input_pad,
                count: to.input_count(),
            }
            .into());
        }

        if from.pad_link(PadDirection::Output, output_pad).is_some() {
            return Err(LinkError::PadOccupied {
                node: src,
                direction: PadDirection::Output,
                pad: output_pad,
            }
            .into());
        }
        if to.pad_link(PadDirection::Input, input_pad).is_some() {
            return Err(LinkError::PadOccupied {
                node: dst,
                direction: PadDirection::Input,
                pad: input_pad,
            }
            .into());
        }

        self.links
            .try_reserve(1)
            .map_err(|e| allocation_error("link arena", e))?;
        let id = LinkId(self.links.len());
        let link = Link::new(id, Endpoint::new(src, output_pad), Endpoint::new(dst, input_pad));
        log::debug!("linked {} -> {} as {}", link.from, link.to, id);
        self.links.push(link);

        self.nodes[si].outputs[output_pad].link = Some(id);
        self.nodes[di].inputs[input_pad].link = Some(id);
        Ok(id)
    }

    /// Get a link by ID.
    pub fn get_link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    /// Get all links.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Get the number of links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Links leaving a node.
    pub fn links_from(&self, id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.from.node == id)
    }

    /// Links entering a node.
    pub fn links_to(&self, id: NodeId) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.to.node == id)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Validate the graph, negotiate formats and fix the schedule.
    ///
    /// Either everything is committed or nothing is: a failed call leaves
    /// the graph unconfigured and unchanged.
    pub fn configure(&mut self) -> FilterResult<()> {
        if self.configured {
            return Err(FilterError::AlreadyConfigured);
        }

        let plan = ValidationPipeline::default()
            .plan(self)
            .map_err(|report| {
                log::debug!("configuration of graph {} failed: {}", self.id, report.summary());
                FilterError::Configuration { report }
            })?;

        for warning in &plan.report.warnings {
            log::warn!("graph {}: {}", self.id, warning.message);
        }

        for (link, format) in self.links.iter_mut().zip(plan.formats) {
            link.format = Some(format);
        }
        self.schedule = plan.order;
        self.configured = true;

        log::debug!(
            "configured graph {} ({} nodes, {} links) in {}ms",
            self.id,
            self.node_count(),
            self.links.len(),
            plan.report.duration_ms
        );
        Ok(())
    }

    /// Tear the graph down, releasing every node, link and queued frame.
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for FilterGraph {
    fn drop(&mut self) {
        log::debug!(
            "destroying graph {} ({} nodes, {} links)",
            self.id,
            self.nodes.len(),
            self.links.len()
        );
    }
}
