//! Graph linearization: turn the dataflow graph into an ordered pipeline.
//!
//! The traversal walks backward from every workflow output port, following
//! data links against their direction. Each stage encountered is resolved
//! through the stage-kind registry and appended to the result; a stage that is
//! rediscovered on another path is removed from its earlier position and
//! re-appended, so its position reflects its most downstream discovery. The
//! accumulated list is then reversed once, which yields source-to-sink order
//! with every producer before all of its consumers.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, trace};

use super::{PortRef, StageProperties, WorkflowGraph};
use crate::error::{FlowgenError, Result};
use crate::pipeline::{Pipeline, PipelineStage, StageDescriptor};
use crate::stage::{normalize_kind, StageKindRegistry};

/// Check the versioned shape policy the compiler supports: exactly one
/// workflow input port and exactly one workflow output port. These are
/// compatibility constraints, not requirements of the traversal itself, so
/// they are checked explicitly before linearization begins.
pub fn check_shape(graph: &dyn WorkflowGraph) -> Result<()> {
    if graph.input_ports().len() != 1 {
        return Err(FlowgenError::shape(
            "found more or fewer than one workflow input port",
        ));
    }
    if graph.output_ports().len() != 1 {
        return Err(FlowgenError::shape(
            "found more or fewer than one workflow output port",
        ));
    }
    Ok(())
}

/// Linearizes a workflow graph into a [`Pipeline`].
pub struct Linearizer<'a> {
    graph: &'a dyn WorkflowGraph,
    registry: &'a StageKindRegistry,
}

impl<'a> Linearizer<'a> {
    pub fn new(graph: &'a dyn WorkflowGraph, registry: &'a StageKindRegistry) -> Self {
        Self { graph, registry }
    }

    /// Produce the ordered pipeline, or fail without producing anything.
    pub fn linearize(&self) -> Result<Pipeline> {
        self.reject_cycles()?;

        let mut entries: Vec<PipelineStage> = Vec::new();
        let mut frontier: Vec<PortRef> = self
            .graph
            .output_ports()
            .into_iter()
            .map(PortRef::WorkflowOutput)
            .collect();

        while !frontier.is_empty() {
            let mut next_frontier: Vec<PortRef> = Vec::new();

            for port in &frontier {
                trace!(?port, "visiting frontier port");
                for link in self.graph.links_to(port) {
                    let (stage_name, _producer_port) = match link.from {
                        // The edge terminates at the workflow boundary; the
                        // destination port is fed directly by workflow input
                        // and no stage is created for it.
                        PortRef::WorkflowInput(name) => {
                            debug!(workflow_input = %name, ?port, "port fed directly by workflow input");
                            continue;
                        }
                        PortRef::StageOutput { stage, port } => (stage, port),
                        other => {
                            return Err(FlowgenError::shape(format!(
                                "data link from unexpected port {other:?}"
                            )))
                        }
                    };

                    match entries
                        .iter()
                        .position(|e| e.descriptor.name == stage_name)
                    {
                        Some(idx) => {
                            // Rediscovered on another sink-ward path: move to
                            // the end so the final reversal places it before
                            // all of its consumers.
                            let entry = entries.remove(idx);
                            debug!(stage = %stage_name, "re-appending already linearized stage");
                            entries.push(entry);
                        }
                        None => {
                            entries.push(self.build_stage(&stage_name)?);
                        }
                    }

                    for input_port in self.graph.stage_input_ports(&stage_name) {
                        let port = PortRef::StageInput {
                            stage: stage_name.clone(),
                            port: input_port,
                        };
                        if !next_frontier.contains(&port) {
                            next_frontier.push(port);
                        }
                    }
                }
            }

            frontier = next_frontier;
        }

        // We walked the workflow backward; flip into source-to-sink order.
        entries.reverse();
        debug!(
            stages = ?entries.iter().map(|e| e.descriptor.name.as_str()).collect::<Vec<_>>(),
            "linearized pipeline"
        );
        Ok(Pipeline::new(entries))
    }

    /// Resolve a newly discovered stage: kind lookup, descriptor with full
    /// port lists, and output wiring.
    fn build_stage(&self, stage_name: &str) -> Result<PipelineStage> {
        let kind_uri = self.graph.stage_kind(stage_name).ok_or_else(|| {
            FlowgenError::shape(format!("stage '{stage_name}' has no bound activity kind"))
        })?;
        let props = StageProperties {
            graph: self.graph,
            stage: stage_name,
        };
        let config = self.registry.resolve(&kind_uri, stage_name, &props)?;

        let mut descriptor = StageDescriptor {
            name: stage_name.to_string(),
            kind: normalize_kind(&kind_uri),
            input_ports: self.graph.stage_input_ports(stage_name),
            output_ports: self.graph.stage_output_ports(stage_name),
            output_forward: Default::default(),
        };

        for output_port in descriptor.output_ports.clone() {
            let from = PortRef::StageOutput {
                stage: stage_name.to_string(),
                port: output_port.clone(),
            };
            for link in self.graph.links_from(&from) {
                let consumer = match link.to {
                    PortRef::StageInput { stage, port } => format!("{stage}_{port}"),
                    PortRef::WorkflowOutput(name) => name,
                    other => {
                        return Err(FlowgenError::shape(format!(
                            "data link to unexpected port {other:?}"
                        )))
                    }
                };
                descriptor.output_forward.insert(output_port.clone(), consumer);
            }
        }

        Ok(PipelineStage { descriptor, config })
    }

    /// Reject cyclic graphs up front. The backward traversal would walk a
    /// cycle forever, so this is checked on the stage-level dependency graph
    /// before anything else.
    fn reject_cycles(&self) -> Result<()> {
        let mut dag: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        for name in self.graph.stage_names() {
            let idx = dag.add_node(name.clone());
            nodes.insert(name, idx);
        }
        for name in self.graph.stage_names() {
            for output_port in self.graph.stage_output_ports(&name) {
                let from = PortRef::StageOutput {
                    stage: name.clone(),
                    port: output_port,
                };
                for link in self.graph.links_from(&from) {
                    if let PortRef::StageInput { stage: consumer, .. } = link.to {
                        if let (Some(&a), Some(&b)) = (nodes.get(&name), nodes.get(&consumer)) {
                            dag.add_edge(a, b, ());
                        }
                    }
                }
            }
        }

        toposort(&dag, None)
            .map(|_| ())
            .map_err(|cycle| FlowgenError::cyclic(dag[cycle.node_id()].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::MemoryGraph;

    const BEANSHELL: &str = "http://ns.taverna.org.uk/2010/activity/beanshell";

    fn stage_in(stage: &str, port: &str) -> PortRef {
        PortRef::StageInput {
            stage: stage.to_string(),
            port: port.to_string(),
        }
    }

    fn stage_out(stage: &str, port: &str) -> PortRef {
        PortRef::StageOutput {
            stage: stage.to_string(),
            port: port.to_string(),
        }
    }

    /// in → wordcount → result, the single-stage reference scenario.
    fn wordcount_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph
            .add_workflow_input("in")
            .add_workflow_output("result")
            .add_stage("wordcount", BEANSHELL, &["input"], &["output"])
            .set_stage_property("wordcount", "script", "count()")
            .link(
                PortRef::WorkflowInput("in".to_string()),
                stage_in("wordcount", "input"),
            )
            .link(
                stage_out("wordcount", "output"),
                PortRef::WorkflowOutput("result".to_string()),
            );
        graph
    }

    #[test]
    fn shape_policy_accepts_single_input_single_output() {
        assert!(check_shape(&wordcount_graph()).is_ok());
    }

    #[test]
    fn shape_policy_rejects_extra_workflow_ports() {
        let mut graph = wordcount_graph();
        graph.add_workflow_input("in2");
        let err = check_shape(&graph).unwrap_err();
        assert!(matches!(err, FlowgenError::UnsupportedGraphShape { .. }));

        let mut graph = wordcount_graph();
        graph.add_workflow_output("result2");
        assert!(check_shape(&graph).is_err());
    }

    #[test]
    fn single_stage_pipeline_matches_reference_scenario() {
        let graph = wordcount_graph();
        let registry = StageKindRegistry::with_defaults();
        let pipeline = Linearizer::new(&graph, &registry).linearize().unwrap();

        assert_eq!(pipeline.len(), 1);
        let descriptor = pipeline.descriptors().next().unwrap();
        assert_eq!(descriptor.name, "wordcount");
        assert_eq!(descriptor.kind, "Beanshell");
        assert_eq!(descriptor.input_ports, vec!["input"]);
        assert_eq!(
            descriptor.output_forward.get("output").map(String::as_str),
            Some("result")
        );
    }

    /// source → filter → sink as a three-stage chain.
    fn chain_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph
            .add_workflow_input("in")
            .add_workflow_output("result")
            .add_stage("load", BEANSHELL, &["input"], &["output"])
            .add_stage("filter", BEANSHELL, &["input"], &["output"])
            .add_stage("emit", BEANSHELL, &["input"], &["output"])
            .link(
                PortRef::WorkflowInput("in".to_string()),
                stage_in("load", "input"),
            )
            .link(stage_out("load", "output"), stage_in("filter", "input"))
            .link(stage_out("filter", "output"), stage_in("emit", "input"))
            .link(
                stage_out("emit", "output"),
                PortRef::WorkflowOutput("result".to_string()),
            );
        graph
    }

    #[test]
    fn chain_is_ordered_source_to_sink_without_duplicates() {
        let graph = chain_graph();
        let registry = StageKindRegistry::with_defaults();
        let pipeline = Linearizer::new(&graph, &registry).linearize().unwrap();

        let names: Vec<_> = pipeline.descriptors().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["load", "filter", "emit"]);

        // Wiring between the stages uses `{stage}_{port}` names.
        let load = pipeline.descriptors().next().unwrap();
        assert_eq!(
            load.output_forward.get("output").map(String::as_str),
            Some("filter_input")
        );
    }

    /// a feeds both b and c; both feed the merge stage before the sink.
    fn diamond_graph() -> MemoryGraph {
        let mut graph = MemoryGraph::new();
        graph
            .add_workflow_input("in")
            .add_workflow_output("result")
            .add_stage("a", BEANSHELL, &["input"], &["output"])
            .add_stage("b", BEANSHELL, &["input"], &["output"])
            .add_stage("c", BEANSHELL, &["input"], &["output"])
            .add_stage("merge", BEANSHELL, &["left", "right"], &["output"])
            .link(
                PortRef::WorkflowInput("in".to_string()),
                stage_in("a", "input"),
            )
            .link(stage_out("a", "output"), stage_in("b", "input"))
            .link(stage_out("a", "output"), stage_in("c", "input"))
            .link(stage_out("b", "output"), stage_in("merge", "left"))
            .link(stage_out("c", "output"), stage_in("merge", "right"))
            .link(
                stage_out("merge", "output"),
                PortRef::WorkflowOutput("result".to_string()),
            );
        graph
    }

    #[test]
    fn diamond_stage_appears_once_before_both_consumers() {
        let graph = diamond_graph();
        let registry = StageKindRegistry::with_defaults();
        let pipeline = Linearizer::new(&graph, &registry).linearize().unwrap();

        let names: Vec<_> = pipeline.descriptors().map(|d| d.name.as_str()).collect();
        assert_eq!(names.iter().filter(|n| **n == "a").count(), 1);

        let pos_a = pipeline.position("a").unwrap();
        assert!(pos_a < pipeline.position("b").unwrap());
        assert!(pos_a < pipeline.position("c").unwrap());
        assert!(pipeline.position("b").unwrap() < pipeline.position("merge").unwrap());
        assert!(pipeline.position("c").unwrap() < pipeline.position("merge").unwrap());
    }

    #[test]
    fn every_producer_precedes_its_consumers() {
        let graph = diamond_graph();
        let registry = StageKindRegistry::with_defaults();
        let pipeline = Linearizer::new(&graph, &registry).linearize().unwrap();

        for descriptor in pipeline.descriptors() {
            let producer_pos = pipeline.position(&descriptor.name).unwrap();
            for consumer in descriptor.output_forward.values() {
                if let Some((consumer_stage, _)) = consumer.split_once('_') {
                    if let Some(consumer_pos) = pipeline.position(consumer_stage) {
                        assert!(
                            producer_pos < consumer_pos,
                            "{} must precede {}",
                            descriptor.name,
                            consumer_stage
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn unregistered_kind_aborts_linearization() {
        let mut graph = wordcount_graph();
        graph.add_stage("fit", "http://example.org/activity/rscript", &["input"], &["output"]);
        graph.link(
            stage_out("fit", "output"),
            stage_in("wordcount", "input"),
        );
        graph.link(
            PortRef::WorkflowInput("in".to_string()),
            stage_in("fit", "input"),
        );

        let registry = StageKindRegistry::with_defaults();
        let err = Linearizer::new(&graph, &registry).linearize().unwrap_err();
        assert!(matches!(
            err,
            FlowgenError::UnsupportedActivityKind { kind, .. } if kind == "Rscript"
        ));
    }

    #[test]
    fn cyclic_graph_is_rejected() {
        let mut graph = MemoryGraph::new();
        graph
            .add_workflow_input("in")
            .add_workflow_output("result")
            .add_stage("a", BEANSHELL, &["input"], &["output"])
            .add_stage("b", BEANSHELL, &["input"], &["output"])
            .link(
                PortRef::WorkflowInput("in".to_string()),
                stage_in("a", "input"),
            )
            .link(stage_out("a", "output"), stage_in("b", "input"))
            .link(stage_out("b", "output"), stage_in("a", "input"))
            .link(
                stage_out("b", "output"),
                PortRef::WorkflowOutput("result".to_string()),
            );

        let registry = StageKindRegistry::with_defaults();
        let err = Linearizer::new(&graph, &registry).linearize().unwrap_err();
        assert!(matches!(err, FlowgenError::CyclicGraph { .. }));
    }
}
