//! # Flowgen
//!
//! Compiles a declarative dataflow workflow graph into generated source code
//! for a batch-pipeline execution framework. Two engines do the work: the
//! graph linearizer turns the acyclic workflow graph into an ordered pipeline
//! of stage descriptors, and the template expansion engine stitches per-stage
//! source fragments into one output artifact, resolving variables and
//! aggregating import declarations along the way.
//!
//! ## Modules
//!
//! - `bundle` - JSON workflow-bundle adapter feeding the in-memory graph
//! - `config` - Generator configuration and the kind-to-template mapping file
//! - `driver` - End-to-end conversion: graph → pipeline → artifact
//! - `error` - Unified error type for the whole generator
//! - `graph` - Workflow graph model, trait and linearizer
//! - `pipeline` - Ordered stage descriptors produced by linearization
//! - `stage` - Stage-kind registry and per-kind fragment producers
//! - `template` - Placeholder grammar, expansion engine, import aggregation

pub mod bundle;
pub mod config;
pub mod driver;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod stage;
pub mod template;

pub use config::{GeneratorConfig, TemplateMapping};
pub use driver::Driver;
pub use error::{FlowgenError, Result};
pub use graph::linearize::Linearizer;
pub use pipeline::{Pipeline, StageDescriptor};
pub use stage::StageKindRegistry;
pub use template::{ExpandContext, ImportSet, TemplateEngine};
