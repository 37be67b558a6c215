//! Topological analysis of graphs.
//!
//! Provides algorithms for:
//! - Topological sorting (scheduling order)
//! - Cycle detection, including self-links
//! - Reachability from root nodes

use crate::core::error::{LinkId, NodeId};
use crate::graph::structure::FilterGraph;
use petgraph::algo::{connected_components, is_cyclic_directed, tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use std::collections::{HashMap, HashSet};

/// Analyzer for graph topology.
///
/// Mirrors the live nodes and the links into a petgraph `DiGraph`.
/// Discarded nodes are left out.
pub struct TopologyAnalyzer<'a> {
    graph: &'a FilterGraph,
    dag: DiGraph<NodeId, LinkId>,
    /// Arena index to `dag` index.
    lookup: HashMap<usize, NodeIndex>,
}

impl<'a> TopologyAnalyzer<'a> {
    /// Create a new analyzer for the given graph.
    pub fn new(graph: &'a FilterGraph) -> Self {
        let mut dag = DiGraph::with_capacity(graph.node_count(), graph.link_count());
        let mut lookup = HashMap::with_capacity(graph.node_count());
        for node in graph.nodes() {
            lookup.insert(node.id().index, dag.add_node(node.id()));
        }
        for link in graph.links() {
            if let (Some(&from), Some(&to)) =
                (lookup.get(&link.from.node.index), lookup.get(&link.to.node.index))
            {
                dag.add_edge(from, to, link.id);
            }
        }
        Self { graph, dag, lookup }
    }

    /// Nodes in an order where upstream comes before downstream.
    ///
    /// Fails with the nodes involved in cycles.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, Vec<NodeId>> {
        toposort(&self.dag, None)
            .map(|order| order.into_iter().map(|ix| self.dag[ix]).collect())
            .map_err(|_| self.cycles().into_iter().flatten().collect())
    }

    /// Check if the graph has any cycles.
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.dag)
    }

    /// Every cycle as the set of nodes it runs through.
    ///
    /// A self-link forms a cycle of one node.
    pub fn cycles(&self) -> Vec<Vec<NodeId>> {
        tarjan_scc(&self.dag)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.dag.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut nodes: Vec<NodeId> = scc.into_iter().map(|ix| self.dag[ix]).collect();
                nodes.sort_by_key(|n| n.index);
                nodes
            })
            .collect()
    }

    /// Initialized nodes without input pads.
    pub fn roots(&self) -> Vec<NodeId> {
        self.graph
            .nodes()
            .filter(|n| n.is_initialized() && n.input_count() == 0)
            .map(|n| n.id())
            .collect()
    }

    /// Initialized nodes that no root reaches.
    pub fn unreachable(&self) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        for root in self.roots() {
            let Some(&start) = self.lookup.get(&root.index) else {
                continue;
            };
            let mut dfs = Dfs::new(&self.dag, start);
            while let Some(ix) = dfs.next(&self.dag) {
                visited.insert(self.dag[ix].index);
            }
        }

        self.graph
            .nodes()
            .filter(|n| n.is_initialized() && !visited.contains(&n.id().index))
            .map(|n| n.id())
            .collect()
    }

    /// All nodes fed, directly or not, by the given node.
    pub fn downstream(&self, id: NodeId) -> Vec<NodeId> {
        let Some(&start) = self.lookup.get(&id.index) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.dag, start);
        let mut result = Vec::new();
        while let Some(ix) = dfs.next(&self.dag) {
            if ix != start {
                result.push(self.dag[ix]);
            }
        }
        result
    }

    /// All nodes feeding, directly or not, the given node.
    pub fn upstream(&self, id: NodeId) -> Vec<NodeId> {
        let Some(&start) = self.lookup.get(&id.index) else {
            return Vec::new();
        };
        let reversed = Reversed(&self.dag);
        let mut dfs = Dfs::new(reversed, start);
        let mut result = Vec::new();
        while let Some(ix) = dfs.next(reversed) {
            if ix != start {
                result.push(self.dag[ix]);
            }
        }
        result
    }

    /// Number of weakly connected subgraphs.
    pub fn subgraph_count(&self) -> usize {
        connected_components(&self.dag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::registry::FilterRegistry;

    fn ready(graph: &mut FilterGraph, kind: &str) -> NodeId {
        let id = graph.allocate_node(kind).unwrap();
        graph.initialize(id).unwrap();
        id
    }

    /// buffer -> asplit -> (anull, anull) -> amix -> buffersink
    fn diamond() -> (FilterGraph, Vec<NodeId>) {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let src = ready(&mut graph, "buffer");
        let split = ready(&mut graph, "asplit");
        let left = ready(&mut graph, "anull");
        let right = ready(&mut graph, "anull");
        let mix = ready(&mut graph, "amix");
        let sink = ready(&mut graph, "buffersink");

        graph.link(src, 0, split, 0).unwrap();
        graph.link(split, 0, left, 0).unwrap();
        graph.link(split, 1, right, 0).unwrap();
        graph.link(left, 0, mix, 0).unwrap();
        graph.link(right, 0, mix, 1).unwrap();
        graph.link(mix, 0, sink, 0).unwrap();

        (graph, vec![src, split, left, right, mix, sink])
    }

    #[test]
    fn test_topological_order() {
        let (graph, ids) = diamond();
        let analyzer = TopologyAnalyzer::new(&graph);
        let order = analyzer.topological_order().unwrap();

        let pos = |id: NodeId| order.iter().position(|&n| n == id).unwrap();
        assert!(pos(ids[0]) < pos(ids[1]));
        assert!(pos(ids[2]) < pos(ids[4]));
        assert!(pos(ids[3]) < pos(ids[4]));
        assert!(pos(ids[4]) < pos(ids[5]));
        assert!(!analyzer.has_cycle());
    }

    #[test]
    fn test_reachability() {
        let (graph, ids) = diamond();
        let analyzer = TopologyAnalyzer::new(&graph);

        assert_eq!(analyzer.roots(), vec![ids[0]]);
        assert!(analyzer.unreachable().is_empty());
        assert_eq!(analyzer.downstream(ids[4]), vec![ids[5]]);
        assert_eq!(analyzer.upstream(ids[2]).len(), 2);
        assert_eq!(analyzer.subgraph_count(), 1);
    }

    #[test]
    fn test_self_link_is_a_cycle() {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let src = ready(&mut graph, "buffer");
        let mix = ready(&mut graph, "amix");
        graph.link(src, 0, mix, 0).unwrap();
        graph.link(mix, 0, mix, 1).unwrap();

        let analyzer = TopologyAnalyzer::new(&graph);
        assert!(analyzer.has_cycle());
        assert_eq!(analyzer.cycles(), vec![vec![mix]]);
        assert_eq!(analyzer.topological_order(), Err(vec![mix]));
    }

    #[test]
    fn test_cycle_without_root_is_unreachable() {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let src = ready(&mut graph, "buffer");
        let sink = ready(&mut graph, "buffersink");
        let a = ready(&mut graph, "anull");
        let b = ready(&mut graph, "anull");
        graph.link(src, 0, sink, 0).unwrap();
        graph.link(a, 0, b, 0).unwrap();
        graph.link(b, 0, a, 0).unwrap();

        let analyzer = TopologyAnalyzer::new(&graph);
        assert_eq!(analyzer.cycles(), vec![vec![a, b]]);
        assert_eq!(analyzer.unreachable(), vec![a, b]);
        assert_eq!(analyzer.subgraph_count(), 2);
    }

    #[test]
    fn test_discarded_nodes_are_skipped() {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let gone = graph.allocate_node("anull").unwrap();
        let src = ready(&mut graph, "buffer");
        let sink = ready(&mut graph, "buffersink");
        graph.link(src, 0, sink, 0).unwrap();
        graph.discard_node(gone).unwrap();

        let analyzer = TopologyAnalyzer::new(&graph);
        assert_eq!(analyzer.topological_order(), Ok(vec![src, sink]));
        assert_eq!(analyzer.downstream(src), vec![sink]);
        assert!(analyzer.downstream(gone).is_empty());
        assert!(analyzer.unreachable().is_empty());
        assert_eq!(analyzer.subgraph_count(), 1);
    }
}
