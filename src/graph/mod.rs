//! Workflow graph model.
//!
//! The generator consumes the dataflow graph read-only, through the
//! [`WorkflowGraph`] trait: ports, stages and directed data links between
//! ports. How the graph got into memory (bundle format, file layout) is the
//! caller's concern; [`MemoryGraph`] is the in-memory implementation used by
//! the JSON adapter and the tests.

pub mod linearize;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A port endpoint in the workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortRef {
    /// A workflow-level input port.
    WorkflowInput(String),
    /// A workflow-level output port (a sink of the dataflow).
    WorkflowOutput(String),
    /// An input port of a stage.
    StageInput { stage: String, port: String },
    /// An output port of a stage.
    StageOutput { stage: String, port: String },
}

/// A directed connection from one sender port to one receiver port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLink {
    pub from: PortRef,
    pub to: PortRef,
}

/// Named string properties of a stage's configuration record.
pub trait PropertySource {
    fn property(&self, name: &str) -> Option<String>;
}

/// Read-only view of the external workflow graph.
pub trait WorkflowGraph {
    /// Workflow-level input port names.
    fn input_ports(&self) -> Vec<String>;
    /// Workflow-level output port names.
    fn output_ports(&self) -> Vec<String>;
    /// All stage names, in declaration order.
    fn stage_names(&self) -> Vec<String>;
    /// The activity-kind identifier (URI or plain string) bound to a stage.
    fn stage_kind(&self, stage: &str) -> Option<String>;
    /// Declared input port names of a stage, in declaration order.
    fn stage_input_ports(&self, stage: &str) -> Vec<String>;
    /// Declared output port names of a stage, in declaration order.
    fn stage_output_ports(&self, stage: &str) -> Vec<String>;
    /// A named property of the stage's configuration record.
    fn stage_property(&self, stage: &str, name: &str) -> Option<String>;
    /// Data links arriving at a port.
    fn links_to(&self, port: &PortRef) -> Vec<DataLink>;
    /// Data links leaving a port.
    fn links_from(&self, port: &PortRef) -> Vec<DataLink>;
}

/// Configuration-record view of one stage, backed by the graph.
pub struct StageProperties<'a> {
    pub graph: &'a dyn WorkflowGraph,
    pub stage: &'a str,
}

impl PropertySource for StageProperties<'_> {
    fn property(&self, name: &str) -> Option<String> {
        self.graph.stage_property(self.stage, name)
    }
}

#[derive(Debug, Clone, Default)]
struct StageRecord {
    kind: String,
    input_ports: Vec<String>,
    output_ports: Vec<String>,
    properties: HashMap<String, String>,
}

/// In-memory [`WorkflowGraph`] with a builder-style API.
#[derive(Debug, Clone, Default)]
pub struct MemoryGraph {
    inputs: Vec<String>,
    outputs: Vec<String>,
    stage_order: Vec<String>,
    stages: HashMap<String, StageRecord>,
    links: Vec<DataLink>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_workflow_input(&mut self, name: &str) -> &mut Self {
        self.inputs.push(name.to_string());
        self
    }

    pub fn add_workflow_output(&mut self, name: &str) -> &mut Self {
        self.outputs.push(name.to_string());
        self
    }

    pub fn add_stage(
        &mut self,
        name: &str,
        kind: &str,
        input_ports: &[&str],
        output_ports: &[&str],
    ) -> &mut Self {
        self.stage_order.push(name.to_string());
        self.stages.insert(
            name.to_string(),
            StageRecord {
                kind: kind.to_string(),
                input_ports: input_ports.iter().map(|p| p.to_string()).collect(),
                output_ports: output_ports.iter().map(|p| p.to_string()).collect(),
                properties: HashMap::new(),
            },
        );
        self
    }

    pub fn set_stage_property(&mut self, stage: &str, name: &str, value: &str) -> &mut Self {
        if let Some(record) = self.stages.get_mut(stage) {
            record.properties.insert(name.to_string(), value.to_string());
        }
        self
    }

    pub fn link(&mut self, from: PortRef, to: PortRef) -> &mut Self {
        self.links.push(DataLink { from, to });
        self
    }
}

impl WorkflowGraph for MemoryGraph {
    fn input_ports(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn output_ports(&self) -> Vec<String> {
        self.outputs.clone()
    }

    fn stage_names(&self) -> Vec<String> {
        self.stage_order.clone()
    }

    fn stage_kind(&self, stage: &str) -> Option<String> {
        self.stages.get(stage).map(|r| r.kind.clone())
    }

    fn stage_input_ports(&self, stage: &str) -> Vec<String> {
        self.stages
            .get(stage)
            .map(|r| r.input_ports.clone())
            .unwrap_or_default()
    }

    fn stage_output_ports(&self, stage: &str) -> Vec<String> {
        self.stages
            .get(stage)
            .map(|r| r.output_ports.clone())
            .unwrap_or_default()
    }

    fn stage_property(&self, stage: &str, name: &str) -> Option<String> {
        self.stages
            .get(stage)
            .and_then(|r| r.properties.get(name).cloned())
    }

    fn links_to(&self, port: &PortRef) -> Vec<DataLink> {
        self.links.iter().filter(|l| &l.to == port).cloned().collect()
    }

    fn links_from(&self, port: &PortRef) -> Vec<DataLink> {
        self.links
            .iter()
            .filter(|l| &l.from == port)
            .cloned()
            .collect()
    }
}
