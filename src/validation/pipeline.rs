//! Validation pipeline implementation.

use crate::core::error::{ValidationError, ValidationReport};
use crate::core::frame::FrameFormat;
use crate::graph::structure::FilterGraph;
use crate::graph::topology::TopologyAnalyzer;
use crate::validation::negotiation::negotiate_formats;
use crate::validation::stages::{
    InitializationValidation, StructuralValidation, TopologyValidation, ValidationStage,
};
use std::time::Instant;

/// Everything `configure` commits when validation succeeds.
#[derive(Debug, Clone)]
pub struct ConfigurationPlan {
    /// Node indices in topological order.
    pub order: Vec<usize>,
    /// Negotiated format per link, indexed by link.
    pub formats: Vec<FrameFormat>,
    /// Report of the successful run (warnings only).
    pub report: ValidationReport,
}

/// Multi-stage validation pipeline.
///
/// Runs a series of validation stages on a graph to check for errors
/// before frames may flow.
pub struct ValidationPipeline {
    stages: Vec<Box<dyn ValidationStage>>,
}

impl ValidationPipeline {
    /// Create a new pipeline with the given stages.
    pub fn new(stages: Vec<Box<dyn ValidationStage>>) -> Self {
        Self { stages }
    }

    /// Create the default validation pipeline with all standard stages.
    pub fn default_pipeline() -> Self {
        Self {
            stages: vec![
                Box::new(InitializationValidation),
                Box::new(StructuralValidation),
                Box::new(TopologyValidation),
            ],
        }
    }

    /// Add a custom validation stage.
    pub fn add_stage(&mut self, stage: Box<dyn ValidationStage>) {
        self.stages.push(stage);
    }

    /// Validate a graph through all stages.
    pub fn validate(&self, graph: &FilterGraph) -> ValidationReport {
        let start = Instant::now();
        let mut report = ValidationReport::new();

        for stage in &self.stages {
            log::trace!("running {}", stage.name());
            match stage.validate(graph) {
                Ok(warnings) => {
                    for warning in warnings {
                        report.add_warning(warning);
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let is_fatal = error.is_fatal();
                        report.add_error(error);

                        // Stop on fatal errors
                        if is_fatal {
                            report.duration_ms = start.elapsed().as_millis() as u64;
                            return report;
                        }
                    }
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Validate, then order the nodes and negotiate formats.
    ///
    /// The graph is only read. Stages run in order and validation stops
    /// at the first fatal error, so on failure the report holds the errors
    /// found up to that point. Ordering and negotiation only run once every
    /// stage has passed.
    pub fn plan(&self, graph: &FilterGraph) -> Result<ConfigurationPlan, ValidationReport> {
        let start = Instant::now();
        let mut report = self.validate(graph);
        if !report.can_configure() {
            return Err(report);
        }

        let order = match TopologyAnalyzer::new(graph).topological_order() {
            Ok(order) => order.into_iter().map(|id| id.index).collect::<Vec<_>>(),
            Err(nodes) => {
                report.add_error(ValidationError::CycleDetected { nodes });
                return Err(report);
            }
        };

        let formats = match negotiate_formats(graph, &order) {
            Ok(formats) => formats,
            Err(error) => {
                report.add_error(error);
                report.duration_ms = start.elapsed().as_millis() as u64;
                return Err(report);
            }
        };

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(ConfigurationPlan {
            order,
            formats,
            report,
        })
    }

    /// Quick validation - just check if the graph could be configured.
    pub fn can_configure(&self, graph: &FilterGraph) -> bool {
        self.plan(graph).is_ok()
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::default_pipeline()
    }
}
