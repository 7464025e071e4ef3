//! End-to-end conversion: graph → pipeline → expanded wrapper → artifact.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::{GeneratorConfig, TemplateMapping, WRAPPER_TEMPLATE};
use crate::error::{FlowgenError, Result};
use crate::graph::linearize::{check_shape, Linearizer};
use crate::graph::WorkflowGraph;
use crate::pipeline::Pipeline;
use crate::stage::{quote_script, StageKindRegistry};
use crate::template::{
    substitute_variables, ExpandContext, Expansion, ImportSet, Specializer, TemplateEngine,
};

/// Inclusion point of the wrapper template that receives the concatenated
/// map/reduce class fragments.
const MAPREDUCE_INCLUSION_POINT: &str = "includemapreduce";

/// Inclusion point of the wrapper template that receives the concatenated
/// run-method fragments.
const RUN_INCLUSION_POINT: &str = "includerun";

/// Fixed format identifiers bound onto every stage.
const INPUT_FORMAT: &str = "TextInputFormat";
const OUTPUT_FORMAT: &str = "TextOutputFormat";

/// Orchestrates one conversion run.
pub struct Driver<'a> {
    config: &'a GeneratorConfig,
    registry: &'a StageKindRegistry,
    mapping: &'a TemplateMapping,
}

/// Binds `| key` inclusions to the stage the key names, injecting that
/// stage's script and name before generic expansion continues.
struct StageScriptSpecializer {
    scripts: HashMap<String, String>,
}

impl StageScriptSpecializer {
    fn from_pipeline(pipeline: &Pipeline) -> Self {
        let scripts = pipeline
            .iter()
            .filter_map(|s| {
                s.config
                    .script()
                    .map(|script| (s.descriptor.name.clone(), script.to_string()))
            })
            .collect();
        Self { scripts }
    }
}

impl Specializer for StageScriptSpecializer {
    fn specialize(&self, template_file: &str, key: &str, text: &str) -> Result<String> {
        let Some(script) = self.scripts.get(key) else {
            warn!(template_file, key, "include key does not name a pipeline stage");
            return Ok(text.to_string());
        };
        let mut vars = HashMap::new();
        vars.insert("script".to_string(), quote_script(script));
        vars.insert("configname".to_string(), key.to_string());
        Ok(substitute_variables(text, &vars))
    }
}

impl<'a> Driver<'a> {
    pub fn new(
        config: &'a GeneratorConfig,
        registry: &'a StageKindRegistry,
        mapping: &'a TemplateMapping,
    ) -> Self {
        Self {
            config,
            registry,
            mapping,
        }
    }

    /// Convert a workflow graph into a generated source file. Returns the
    /// path written. Nothing is written unless every prior step succeeded.
    pub fn convert(&self, graph: &dyn WorkflowGraph) -> Result<PathBuf> {
        check_shape(graph)?;
        let mut pipeline = Linearizer::new(graph, self.registry).linearize()?;
        info!(stages = pipeline.len(), "pipeline linearized");

        let engine = TemplateEngine::new(&self.config.template_root);
        let expansion = self.translate(&engine, &mut pipeline)?;

        if !expansion.unresolved.is_empty() {
            warn!(
                count = expansion.unresolved.len(),
                placeholders = ?expansion.unresolved,
                "generated source contains unresolved placeholders"
            );
        }

        let output = self.config.output_file();
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| FlowgenError::OutputWrite {
                path: output.clone(),
                source: e,
            })?;
        }
        fs::write(&output, &expansion.text).map_err(|e| FlowgenError::OutputWrite {
            path: output.clone(),
            source: e,
        })?;
        info!(path = %output.display(), "wrote generated source");
        Ok(output)
    }

    /// Expand the wrapper template for a finished pipeline. Kept separate
    /// from [`Driver::convert`] so the full translation can be exercised
    /// without touching the output tree.
    pub fn translate(
        &self,
        engine: &TemplateEngine,
        pipeline: &mut Pipeline,
    ) -> Result<Expansion> {
        self.bind_io(pipeline)?;

        // Produce per-stage fragments in pipeline order and remember the
        // imports they contributed; those must survive into the root
        // translation's import block.
        let mut fragment_imports = ImportSet::new();
        let mut unresolved = Vec::new();
        let mut map_fragments = Vec::with_capacity(pipeline.len());
        let mut run_fragments = Vec::with_capacity(pipeline.len());
        for stage in pipeline.iter() {
            let map = stage.config.map_fragment(engine, self.mapping)?;
            fragment_imports.merge(map.imports);
            unresolved.extend(map.unresolved);
            map_fragments.push(map.text);

            let run = stage.config.run_fragment(engine, self.mapping)?;
            fragment_imports.merge(run.imports);
            unresolved.extend(run.unresolved);
            run_fragments.push(run.text);
        }

        let wrapper = engine.load(WRAPPER_TEMPLATE)?;
        let (wrapper, found) = engine.substitute_inclusion_point(
            &wrapper,
            MAPREDUCE_INCLUSION_POINT,
            &map_fragments.join("\n"),
        );
        if !found {
            return Err(FlowgenError::InvalidWrapper {
                reason: format!("missing inclusion point <%@{MAPREDUCE_INCLUSION_POINT}%>"),
            });
        }
        let (wrapper, found) = engine.substitute_inclusion_point(
            &wrapper,
            RUN_INCLUSION_POINT,
            &run_fragments.join("\n"),
        );
        if !found {
            return Err(FlowgenError::InvalidWrapper {
                reason: format!("missing inclusion point <%@{RUN_INCLUSION_POINT}%>"),
            });
        }

        let specializer = StageScriptSpecializer::from_pipeline(pipeline);
        let mut ctx = ExpandContext::new();
        ctx.set("hadoopclassname", &self.config.class_name);
        ctx.set("hadooppackagename", &self.config.package_name);
        ctx.specializer = Some(&specializer);

        let mut expansion = engine.translate_root(&wrapper, &ctx, fragment_imports)?;
        expansion.unresolved.extend(unresolved);
        Ok(expansion)
    }

    /// Bind the input/output path expressions and format identifiers onto
    /// every stage, in pipeline order.
    fn bind_io(&self, pipeline: &mut Pipeline) -> Result<()> {
        for stage in pipeline.iter_mut() {
            let descriptor = &stage.descriptor;
            if descriptor.input_ports.is_empty() {
                return Err(FlowgenError::shape(format!(
                    "stage '{}' has no input ports",
                    descriptor.name
                )));
            }
            // The forwarding policy below only covers a single output port;
            // refuse multi-output stages instead of silently mis-wiring them.
            if descriptor.output_ports.len() != 1 {
                return Err(FlowgenError::shape(format!(
                    "stage '{}' declares {} output ports; only single-output stages are supported",
                    descriptor.name,
                    descriptor.output_ports.len()
                )));
            }

            let input_path = descriptor
                .input_ports
                .iter()
                .map(|port| format!("{}_{}", descriptor.name, port))
                .collect::<Vec<_>>()
                .join(",");
            let input_path = format!("\"{input_path}\"");

            let first_output = &descriptor.output_ports[0];
            let forwarded = descriptor.output_forward.get(first_output).ok_or_else(|| {
                FlowgenError::shape(format!(
                    "output port '{}' of stage '{}' is not connected",
                    first_output, descriptor.name
                ))
            })?;
            let output_path = format!("\"{forwarded}\"");

            debug!(
                stage = %descriptor.name,
                input_path = %input_path,
                output_path = %output_path,
                "bound stage io"
            );
            let io = stage.config.io_mut();
            io.input_path = input_path;
            io.output_path = output_path;
            io.input_format = INPUT_FORMAT.to_string();
            io.output_format = OUTPUT_FORMAT.to_string();
        }
        Ok(())
    }
}
