//! Declarative graph descriptions.
//!
//! A description names nodes, stages their options and lists links by node
//! name. It loads from TOML or JSON and builds an initialized, linked but
//! not yet configured graph:
//!
//! ```toml
//! [options]
//! source_queue_capacity = 16
//!
//! [[nodes]]
//! name = "in"
//! kind = "buffer"
//! options = { channels = 1 }
//!
//! [[nodes]]
//! name = "out"
//! kind = "buffersink"
//!
//! [[links]]
//! from = "in"
//! to = "out"
//! ```

use crate::core::error::{FilterError, FilterResult, NodeId};
use crate::filters::registry::FilterRegistry;
use crate::graph::structure::{FilterGraph, GraphOptions};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// An option value as written in a description file.
///
/// Scalars are accepted for convenience and staged as their string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOption {
    /// `true` / `false`
    Boolean(bool),
    /// Whole number
    Integer(i64),
    /// Decimal number
    Float(f64),
    /// Anything else, staged verbatim
    Text(String),
}

impl fmt::Display for RawOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawOption::Boolean(b) => write!(f, "{}", b),
            RawOption::Integer(i) => write!(f, "{}", i),
            RawOption::Float(v) => write!(f, "{}", v),
            RawOption::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One node of a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    /// Name used by links
    pub name: String,
    /// Registry kind
    pub kind: String,
    /// Options staged before initialization
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub options: IndexMap<String, RawOption>,
}

/// One link of a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescription {
    /// Upstream node name
    pub from: String,
    /// Output pad on the upstream node
    #[serde(default)]
    pub from_pad: usize,
    /// Downstream node name
    pub to: String,
    /// Input pad on the downstream node
    #[serde(default)]
    pub to_pad: usize,
}

/// Serializable description of a complete graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphDescription {
    /// Graph-wide settings
    pub options: GraphOptions,
    /// Nodes in allocation order
    pub nodes: Vec<NodeDescription>,
    /// Links in linking order
    pub links: Vec<LinkDescription>,
}

/// A graph built from a description, with its node names.
#[derive(Debug)]
pub struct BuiltGraph {
    /// The initialized and linked graph.
    pub graph: FilterGraph,
    /// Node handles by description name.
    pub names: IndexMap<String, NodeId>,
}

impl BuiltGraph {
    /// Handle of a named node.
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }
}

fn description_error(what: &str, err: impl fmt::Display) -> FilterError {
    FilterError::Description(format!("{}: {}", what, err))
}

impl GraphDescription {
    /// Create an empty description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node.
    pub fn with_node(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.nodes.push(NodeDescription {
            name: name.into(),
            kind: kind.into(),
            options: IndexMap::new(),
        });
        self
    }

    /// Add an option to the most recently added node.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.options.insert(key.into(), RawOption::Text(value.into()));
        }
        self
    }

    /// Add a link between pad `from_pad` of `from` and pad `to_pad` of `to`.
    pub fn with_link(
        mut self,
        from: impl Into<String>,
        from_pad: usize,
        to: impl Into<String>,
        to_pad: usize,
    ) -> Self {
        self.links.push(LinkDescription {
            from: from.into(),
            from_pad,
            to: to.into(),
            to_pad,
        });
        self
    }

    /// Parse a TOML description.
    pub fn from_toml_str(text: &str) -> FilterResult<Self> {
        toml::from_str(text).map_err(|e| description_error("invalid TOML", e))
    }

    /// Parse a JSON description.
    pub fn from_json_str(text: &str) -> FilterResult<Self> {
        serde_json::from_str(text).map_err(|e| description_error("invalid JSON", e))
    }

    /// Load a description, choosing the format by file extension.
    pub fn from_path(path: impl AsRef<Path>) -> FilterResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(FilterError::Description(format!(
                "{}: expected a .toml or .json file",
                path.display()
            ))),
        }
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> FilterResult<String> {
        toml::to_string_pretty(self).map_err(|e| description_error("cannot write TOML", e))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_string(&self) -> FilterResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| description_error("cannot write JSON", e))
    }

    /// Allocate, initialize and link every node.
    ///
    /// The result still has to be configured.
    pub fn build(&self, registry: Arc<FilterRegistry>) -> FilterResult<BuiltGraph> {
        let mut graph = FilterGraph::with_options(registry, self.options.clone())?;
        let mut names = IndexMap::with_capacity(self.nodes.len());

        for node in &self.nodes {
            if names.contains_key(&node.name) {
                return Err(FilterError::Description(format!(
                    "node name '{}' is used twice",
                    node.name
                )));
            }

            let id = graph.allocate_node(&node.kind)?;
            for (key, value) in &node.options {
                graph.set_option(id, key.as_str(), value.to_string())?;
            }
            graph.initialize(id)?;
            names.insert(node.name.clone(), id);
        }

        let lookup = |name: &str| {
            names
                .get(name)
                .copied()
                .ok_or_else(|| FilterError::Description(format!("link names unknown node '{}'", name)))
        };
        for link in &self.links {
            let from = lookup(&link.from)?;
            let to = lookup(&link.to)?;
            graph.link(from, link.from_pad, to, link.to_pad)?;
        }

        Ok(BuiltGraph { graph, names })
    }
}
