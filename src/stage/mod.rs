//! Stage-kind dispatch: per-kind configuration and source-fragment producers.

pub mod beanshell;
pub mod registry;

pub use beanshell::BeanshellStage;
pub use registry::{normalize_kind, StageFactory, StageKindRegistry};

use crate::config::TemplateMapping;
use crate::error::Result;
use crate::graph::PropertySource;
use crate::template::{Expansion, TemplateEngine};

/// Path and format expressions bound onto a stage by the driver after
/// linearization, consumed during fragment production.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageIo {
    /// Quoted, comma-joined list of `{stage}_{inputPort}` names.
    pub input_path: String,
    /// Quoted forwarded name of the stage's first output port.
    pub output_path: String,
    pub input_format: String,
    pub output_format: String,
}

/// A stage's kind-specific configuration: knows how to ingest its data from
/// the stage configuration record and how to emit its source fragments.
pub trait StageConfig: std::fmt::Debug {
    /// Stage name, unique within a pipeline.
    fn name(&self) -> &str;

    /// The activity-kind identifier this config was resolved from.
    fn kind_uri(&self) -> &str;

    /// Pull kind-specific fields out of the stage's configuration record.
    fn ingest(&mut self, props: &dyn PropertySource) -> Result<()>;

    /// Render the map/reduce source fragment for this stage.
    fn map_fragment(
        &self,
        engine: &TemplateEngine,
        mapping: &TemplateMapping,
    ) -> Result<Expansion>;

    /// Render the run/driver source fragment for this stage.
    fn run_fragment(
        &self,
        engine: &TemplateEngine,
        mapping: &TemplateMapping,
    ) -> Result<Expansion>;

    fn io(&self) -> &StageIo;

    fn io_mut(&mut self) -> &mut StageIo;

    /// Script body, for kinds that carry one. Used by the include
    /// specializer to inject the script into included fragments.
    fn script(&self) -> Option<&str> {
        None
    }
}

/// Quote a script body for embedding in generated source, escaping embedded
/// double quotes.
pub fn quote_script(script: &str) -> String {
    format!("\"{}\"", script.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_script_escapes_embedded_quotes() {
        assert_eq!(quote_script("say(\"hi\")"), "\"say(\\\"hi\\\")\"");
        assert_eq!(quote_script(""), "\"\"");
    }
}
