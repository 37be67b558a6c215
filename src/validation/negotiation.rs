//! Format negotiation.
//!
//! Walks the nodes in topological order. Each filter sees the formats
//! already fixed on its input links and answers with one format per
//! output pad, or rejects the combination.

use crate::core::error::ValidationError;
use crate::core::frame::FrameFormat;
use crate::graph::structure::FilterGraph;

/// Negotiate a format for every link.
///
/// `order` holds node indices in topological order. The result is indexed
/// by link. Nothing in the graph is modified.
pub fn negotiate_formats(
    graph: &FilterGraph,
    order: &[usize],
) -> Result<Vec<FrameFormat>, ValidationError> {
    let mut formats: Vec<Option<FrameFormat>> = vec![None; graph.links.len()];

    for &index in order {
        let node = &graph.nodes[index];

        let inputs = node
            .inputs
            .iter()
            .enumerate()
            .map(|(pad, port)| {
                port.link
                    .and_then(|link| formats[link.0])
                    .ok_or_else(|| ValidationError::FormatMismatch {
                        node: node.id(),
                        reason: format!("input pad {} has no negotiated format", pad),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let outputs = node
            .filter
            .negotiate(&inputs)
            .map_err(|e| ValidationError::FormatMismatch {
                node: node.id(),
                reason: e.to_string(),
            })?;

        if outputs.len() != node.output_count() {
            return Err(ValidationError::FormatMismatch {
                node: node.id(),
                reason: format!(
                    "{} answered {} format(s) for {} output pad(s)",
                    node.kind(),
                    outputs.len(),
                    node.output_count()
                ),
            });
        }

        for (port, format) in node.outputs.iter().zip(outputs) {
            if let Some(link) = port.link {
                log::trace!("{} negotiated {}", link, format);
                formats[link.0] = Some(format);
            }
        }
    }

    formats
        .into_iter()
        .enumerate()
        .map(|(i, format)| {
            format.ok_or_else(|| ValidationError::Other(format!("link#{} was never negotiated", i)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::NodeId;
    use crate::filters::registry::FilterRegistry;

    fn node(graph: &mut FilterGraph, kind: &str, options: &[(&str, &str)]) -> NodeId {
        let id = graph.allocate_node(kind).unwrap();
        for (key, value) in options {
            graph.set_option(id, *key, *value).unwrap();
        }
        graph.initialize(id).unwrap();
        id
    }

    #[test]
    fn test_formats_flow_downstream() {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let src = node(&mut graph, "buffer", &[("sample_rate", "8000"), ("channels", "1")]);
        let vol = node(&mut graph, "volume", &[]);
        let sink = node(&mut graph, "buffersink", &[]);
        graph.link(src, 0, vol, 0).unwrap();
        graph.link(vol, 0, sink, 0).unwrap();

        let formats = negotiate_formats(&graph, &[0, 1, 2]).unwrap();
        assert_eq!(formats, vec![FrameFormat::new(8_000, 1); 2]);
    }

    #[test]
    fn test_mixer_rejects_different_inputs() {
        let mut graph = FilterGraph::create(FilterRegistry::shared()).unwrap();
        let a = node(&mut graph, "buffer", &[("channels", "1")]);
        let b = node(&mut graph, "buffer", &[("channels", "2")]);
        let mix = node(&mut graph, "amix", &[]);
        let sink = node(&mut graph, "buffersink", &[]);
        graph.link(a, 0, mix, 0).unwrap();
        graph.link(b, 0, mix, 1).unwrap();
        graph.link(mix, 0, sink, 0).unwrap();

        let err = negotiate_formats(&graph, &[0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, ValidationError::FormatMismatch { node, .. } if node == mix));
    }
}
