//! Individual validation stages.
//!
//! Each stage checks for a specific category of errors.

use crate::core::error::{ValidationError, ValidationWarning};
use crate::core::filter::FilterRole;
use crate::core::pad::PadDirection;
use crate::graph::node::NodeState;
use crate::graph::structure::FilterGraph;
use crate::graph::topology::TopologyAnalyzer;
use std::collections::HashMap;

/// Trait for validation stages.
pub trait ValidationStage: Send + Sync {
    /// Name of this validation stage.
    fn name(&self) -> &str;

    /// Validate the graph.
    ///
    /// Returns Ok with warnings, or Err with errors.
    fn validate(&self, graph: &FilterGraph) -> Result<Vec<ValidationWarning>, Vec<ValidationError>>;
}

/// Lifecycle validation - every node has been initialized.
pub struct InitializationValidation;

impl ValidationStage for InitializationValidation {
    fn name(&self) -> &str {
        "Initialization Validation"
    }

    fn validate(&self, graph: &FilterGraph) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
        let errors: Vec<ValidationError> = graph
            .nodes()
            .filter(|n| !n.is_initialized())
            .map(|n| match n.state() {
                NodeState::Failed => ValidationError::InitializationFailed(n.id()),
                _ => ValidationError::NotInitialized(n.id()),
            })
            .collect();

        if errors.is_empty() {
            Ok(Vec::new())
        } else {
            Err(errors)
        }
    }
}

/// Structural validation - checks pad wiring.
///
/// Verifies:
/// - Every declared pad is linked
/// - No pad is used by more than one link
pub struct StructuralValidation;

impl ValidationStage for StructuralValidation {
    fn name(&self) -> &str {
        "Structural Validation"
    }

    fn validate(&self, graph: &FilterGraph) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // Empty graph warning (not error - nothing to run, nothing wrong)
        if graph.is_empty() {
            warnings.push(ValidationWarning {
                message: "Graph is empty".to_string(),
                node_id: None,
                suggestion: Some("Allocate a source, a sink and link them".to_string()),
            });
            return Ok(warnings);
        }

        for node in graph.nodes().filter(|n| n.is_initialized()) {
            for pad in 0..node.input_count() {
                if node.pad_link(PadDirection::Input, pad).is_none() {
                    errors.push(ValidationError::DanglingInput {
                        node: node.id(),
                        kind: node.kind().to_string(),
                        pad,
                    });
                }
            }
            for pad in 0..node.output_count() {
                if node.pad_link(PadDirection::Output, pad).is_none() {
                    errors.push(ValidationError::DanglingOutput {
                        node: node.id(),
                        kind: node.kind().to_string(),
                        pad,
                    });
                }
            }
        }

        let mut uses: HashMap<(PadDirection, usize, usize), usize> = HashMap::new();
        for link in graph.links() {
            *uses
                .entry((PadDirection::Output, link.from.node.index, link.from.pad))
                .or_default() += 1;
            *uses
                .entry((PadDirection::Input, link.to.node.index, link.to.pad))
                .or_default() += 1;
        }
        for link in graph.links() {
            for (direction, endpoint) in [
                (PadDirection::Output, link.from),
                (PadDirection::Input, link.to),
            ] {
                let key = (direction, endpoint.node.index, endpoint.pad);
                // Report each shared endpoint once.
                if uses.get(&key).copied().unwrap_or(0) > 1 {
                    uses.remove(&key);
                    errors.push(ValidationError::DuplicateEndpoint {
                        node: endpoint.node,
                        direction,
                        pad: endpoint.pad,
                    });
                }
            }
        }

        if graph.sinks().is_empty() {
            warnings.push(ValidationWarning {
                message: "Graph has no sink node".to_string(),
                node_id: None,
                suggestion: Some("Add a 'buffersink' to pull frames out".to_string()),
            });
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors)
        }
    }
}

/// Topology validation - checks the link structure as a whole.
///
/// Verifies:
/// - Graph is a DAG (no cycles, no self-links)
/// - There is at least one root
/// - Every node is reachable from a root
pub struct TopologyValidation;

impl ValidationStage for TopologyValidation {
    fn name(&self) -> &str {
        "Topology Validation"
    }

    fn validate(&self, graph: &FilterGraph) -> Result<Vec<ValidationWarning>, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if graph.is_empty() {
            return Ok(warnings);
        }

        let analyzer = TopologyAnalyzer::new(graph);

        for nodes in analyzer.cycles() {
            errors.push(ValidationError::CycleDetected { nodes });
        }

        let roots = analyzer.roots();
        if roots.is_empty() {
            errors.push(ValidationError::NoSources);
        }

        for node in analyzer.unreachable() {
            errors.push(ValidationError::UnreachableNode(node));
        }

        // Roots that are not sources never receive frames.
        for root in roots {
            if let Ok(node) = graph.node(root) {
                if node.role() != FilterRole::Source {
                    warnings.push(ValidationWarning {
                        message: format!("Root {} ({}) is not a source", root, node.kind()),
                        node_id: Some(root),
                        suggestion: Some("Frames can only be pushed into 'buffer' nodes".to_string()),
                    });
                }
            }
        }

        let subgraphs = analyzer.subgraph_count();
        if subgraphs > 1 {
            warnings.push(ValidationWarning {
                message: format!("Graph contains {} disconnected subgraphs", subgraphs),
                node_id: None,
                suggestion: None,
            });
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::NodeId;
    use crate::filters::registry::FilterRegistry;

    fn graph() -> FilterGraph {
        FilterGraph::create(FilterRegistry::shared()).unwrap()
    }

    fn ready(graph: &mut FilterGraph, kind: &str) -> NodeId {
        let id = graph.allocate_node(kind).unwrap();
        graph.initialize(id).unwrap();
        id
    }

    #[test]
    fn test_structural_validation_empty_graph() {
        let result = StructuralValidation.validate(&graph());
        let warnings = result.unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_dangling_pads_reported() {
        let mut graph = graph();
        let split = ready(&mut graph, "asplit");
        let src = ready(&mut graph, "buffer");
        graph.link(src, 0, split, 0).unwrap();

        let errors = StructuralValidation.validate(&graph).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::DanglingOutput { node, .. } if *node == split)));
    }

    #[test]
    fn test_initialization_validation() {
        let mut graph = graph();
        let id = graph.allocate_node("anull").unwrap();

        let errors = InitializationValidation.validate(&graph).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NotInitialized(id)]);
    }

    #[test]
    fn test_initialization_validation_names_failed_nodes() {
        let mut graph = graph();
        let bad = graph.allocate_node("volume").unwrap();
        graph.set_option(bad, "volume", "loud").unwrap();
        assert!(graph.initialize(bad).is_err());

        let errors = InitializationValidation.validate(&graph).unwrap_err();
        assert_eq!(errors, vec![ValidationError::InitializationFailed(bad)]);
        assert!(errors[0].suggested_fix().unwrap().contains("discard_node"));

        graph.discard_node(bad).unwrap();
        assert!(InitializationValidation.validate(&graph).is_ok());
    }

    #[test]
    fn test_topology_validation_reports_unreachable_cycle() {
        let mut graph = graph();
        let src = ready(&mut graph, "buffer");
        let sink = ready(&mut graph, "buffersink");
        let a = ready(&mut graph, "anull");
        let b = ready(&mut graph, "anull");
        graph.link(src, 0, sink, 0).unwrap();
        graph.link(a, 0, b, 0).unwrap();
        graph.link(b, 0, a, 0).unwrap();

        let errors = TopologyValidation.validate(&graph).unwrap_err();
        assert!(errors.iter().any(|e| e.is_fatal()));
        assert!(errors.contains(&ValidationError::UnreachableNode(a)));
    }
}
