//! The Beanshell stage kind: a scripted activity whose script body is
//! embedded into the generated reduce and run fragments.

use tracing::{debug, warn};

use super::{quote_script, StageConfig, StageIo};
use crate::config::TemplateMapping;
use crate::error::{FlowgenError, Result};
use crate::graph::PropertySource;
use crate::template::{ExpandContext, Expansion, TemplateEngine};

/// Run-fragment template for Beanshell stages.
const RUN_TEMPLATE: &str = "beanshell-activity-run.jtemp";

/// Configuration-record property holding the script body.
const SCRIPT_PROPERTY: &str = "script";

#[derive(Debug, Clone)]
pub struct BeanshellStage {
    name: String,
    kind_uri: String,
    script: String,
    io: StageIo,
}

impl BeanshellStage {
    pub fn new(name: &str, kind_uri: &str) -> Self {
        Self {
            name: name.to_string(),
            kind_uri: kind_uri.to_string(),
            script: String::new(),
            io: StageIo::default(),
        }
    }

    /// Fragment templates for this stage's kind, from the mapping file.
    fn templates<'m>(
        &self,
        mapping: &'m TemplateMapping,
    ) -> Result<&'m crate::config::KindTemplates> {
        mapping.templates_for(&self.kind_uri).ok_or_else(|| {
            FlowgenError::unsupported_kind(&self.kind_uri, &self.name)
        })
    }

    /// Variable bindings every fragment of this stage is expanded against.
    fn fragment_context(&self) -> ExpandContext<'static> {
        let mut ctx = ExpandContext::new();
        ctx.set("configname", &self.name);
        ctx.set("script", quote_script(&self.script));
        ctx.set("inputformat", &self.io.input_format);
        ctx.set("outputformat", &self.io.output_format);
        ctx.set("inputpath", &self.io.input_path);
        ctx.set("outputpath", &self.io.output_path);
        ctx
    }

    /// Concatenate the given templates (each newline-terminated) and expand
    /// them against this stage's variables.
    fn render_fragments(
        &self,
        engine: &TemplateEngine,
        template_names: &[&str],
    ) -> Result<Expansion> {
        let mut combined = String::new();
        for name in template_names {
            combined.push_str(&engine.load(name)?);
            combined.push('\n');
        }
        engine.expand(&combined, &self.fragment_context())
    }
}

impl StageConfig for BeanshellStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind_uri(&self) -> &str {
        &self.kind_uri
    }

    fn ingest(&mut self, props: &dyn PropertySource) -> Result<()> {
        match props.property(SCRIPT_PROPERTY) {
            Some(script) => {
                debug!(stage = %self.name, "ingested beanshell script");
                self.script = script;
            }
            None => {
                warn!(stage = %self.name, "no script in stage configuration, using empty script");
                self.script = String::new();
            }
        }
        Ok(())
    }

    fn map_fragment(
        &self,
        engine: &TemplateEngine,
        mapping: &TemplateMapping,
    ) -> Result<Expansion> {
        let templates = self.templates(mapping)?;
        self.render_fragments(
            engine,
            &[&templates.map_template, &templates.reduce_template],
        )
    }

    fn run_fragment(
        &self,
        engine: &TemplateEngine,
        _mapping: &TemplateMapping,
    ) -> Result<Expansion> {
        self.render_fragments(engine, &[RUN_TEMPLATE])
    }

    fn io(&self) -> &StageIo {
        &self.io
    }

    fn io_mut(&mut self) -> &mut StageIo {
        &mut self.io
    }

    fn script(&self) -> Option<&str> {
        Some(&self.script)
    }
}
