//! The ordered pipeline produced by linearization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::stage::StageConfig;

/// Pure description of one stage's position and wiring in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Stage name, unique within the pipeline.
    pub name: String,
    /// Normalized kind name (registry key).
    pub kind: String,
    /// Declared input port names, in graph order.
    pub input_ports: Vec<String>,
    /// Declared output port names, in graph order.
    pub output_ports: Vec<String>,
    /// For each output port, the consuming entity's name: either
    /// `{stage}_{port}` for a downstream stage input or the bare workflow
    /// output port name for a terminal sink.
    pub output_forward: BTreeMap<String, String>,
}

/// One linearized stage: the frozen descriptor plus its kind-specific config.
#[derive(Debug)]
pub struct PipelineStage {
    pub descriptor: StageDescriptor,
    pub config: Box<dyn StageConfig>,
}

/// Ordered sequence of stages, source-to-sink. For every wiring edge between
/// two stages in the pipeline, the producer precedes the consumer.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    pub fn new(stages: Vec<PipelineStage>) -> Self {
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PipelineStage> {
        self.stages.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, PipelineStage> {
        self.stages.iter_mut()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.stages.iter().map(|s| &s.descriptor)
    }

    /// Position of a stage by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.descriptor.name == name)
    }
}
