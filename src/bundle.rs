//! JSON workflow-bundle adapter.
//!
//! The core consumes graphs only through [`crate::graph::WorkflowGraph`]; this
//! module is the thin stand-in for the external bundle reader so the binary
//! runs end to end. Endpoint syntax in link fields: `stage.port` for a stage
//! port, a bare name for a workflow-level port.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{FlowgenError, Result};
use crate::graph::{MemoryGraph, PortRef};

#[derive(Debug, Deserialize)]
pub struct WorkflowBundle {
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub stages: Vec<BundleStage>,
    #[serde(default)]
    pub links: Vec<BundleLink>,
}

#[derive(Debug, Deserialize)]
pub struct BundleStage {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct BundleLink {
    pub from: String,
    pub to: String,
}

/// Read a JSON workflow bundle from disk and build the in-memory graph.
pub fn load_bundle(path: &Path) -> Result<MemoryGraph> {
    let content = fs::read_to_string(path).map_err(|e| FlowgenError::Bundle {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let bundle: WorkflowBundle =
        serde_json::from_str(&content).map_err(|e| FlowgenError::Bundle {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    debug!(
        stages = bundle.stages.len(),
        links = bundle.links.len(),
        "read workflow bundle"
    );
    build_graph(&bundle, path)
}

fn build_graph(bundle: &WorkflowBundle, path: &Path) -> Result<MemoryGraph> {
    let mut graph = MemoryGraph::new();
    for input in &bundle.inputs {
        graph.add_workflow_input(input);
    }
    for output in &bundle.outputs {
        graph.add_workflow_output(output);
    }
    for stage in &bundle.stages {
        let inputs: Vec<&str> = stage.inputs.iter().map(String::as_str).collect();
        let outputs: Vec<&str> = stage.outputs.iter().map(String::as_str).collect();
        graph.add_stage(&stage.name, &stage.kind, &inputs, &outputs);
        for (name, value) in &stage.properties {
            graph.set_stage_property(&stage.name, name, value);
        }
    }
    for link in &bundle.links {
        let from = parse_endpoint(bundle, &link.from, true).ok_or_else(|| {
            FlowgenError::Bundle {
                path: path.to_path_buf(),
                reason: format!("unknown link source '{}'", link.from),
            }
        })?;
        let to = parse_endpoint(bundle, &link.to, false).ok_or_else(|| FlowgenError::Bundle {
            path: path.to_path_buf(),
            reason: format!("unknown link destination '{}'", link.to),
        })?;
        graph.link(from, to);
    }
    Ok(graph)
}

/// Resolve a textual endpoint. `sender` distinguishes the directionality:
/// sender stage ports are outputs and bare sender names are workflow inputs.
fn parse_endpoint(bundle: &WorkflowBundle, endpoint: &str, sender: bool) -> Option<PortRef> {
    if let Some((stage, port)) = endpoint.split_once('.') {
        bundle.stages.iter().find(|s| s.name == stage)?;
        let stage = stage.to_string();
        let port = port.to_string();
        return Some(if sender {
            PortRef::StageOutput { stage, port }
        } else {
            PortRef::StageInput { stage, port }
        });
    }
    if sender {
        bundle
            .inputs
            .iter()
            .find(|i| *i == endpoint)
            .map(|i| PortRef::WorkflowInput(i.clone()))
    } else {
        bundle
            .outputs
            .iter()
            .find(|o| *o == endpoint)
            .map(|o| PortRef::WorkflowOutput(o.clone()))
    }
}
