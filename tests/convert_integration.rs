//! End-to-end conversion tests: workflow graph in, generated source out.

use std::fs;

use tempfile::TempDir;

use flowgen::config::GeneratorConfig;
use flowgen::config::TemplateMapping;
use flowgen::driver::Driver;
use flowgen::graph::{MemoryGraph, PortRef};
use flowgen::stage::StageKindRegistry;
use flowgen::FlowgenError;

const BEANSHELL: &str = "http://ns.taverna.org.uk/2010/activity/beanshell";

fn write_template_tree(dir: &TempDir) {
    fs::write(
        dir.path().join("hadoop-wrapper.jtemp"),
        concat!(
            "package <%= hadoopPackageName %>;\n",
            "<%@ requires imports \"org.apache.hadoop.conf.Configuration\" %>",
            "<%@ imports %>\n",
            "public class <%= hadoopClassName %> {\n",
            "<%@ include mapreduce %>\n",
            "    public static void main(String[] args) throws Exception {\n",
            "<%@ include run %>\n",
            "    }\n",
            "}\n",
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join("identity-map.jtemp"),
        concat!(
            "<%@ requires imports \"org.apache.hadoop.mapreduce.Mapper\" %>",
            "    static class <%= configName %>Map extends Mapper<Object, Text, Text, Text> {}",
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join("identity-reduce.jtemp"),
        concat!(
            "<%@ requires imports \"org.apache.hadoop.mapreduce.Reducer\" %>",
            "    static class <%= configName %>Reduce extends Reducer<Text, Text, Text, Text> {}",
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join("beanshell-activity-reduce.jtemp"),
        concat!(
            "<%@ requires imports \"bsh.Interpreter\" %>",
            "    static class <%= configName %>Reduce { String script = <%= script %>; }",
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join("beanshell-activity-run.jtemp"),
        concat!(
            "        runJob(<%= inputPath %>, <%= outputPath %>, ",
            "\"<%= inputFormat %>\", \"<%= outputFormat %>\");",
        ),
    )
    .unwrap();
    fs::write(
        dir.path().join("mapping"),
        format!("{BEANSHELL}\tidentity-map.jtemp\tbeanshell-activity-reduce.jtemp\n"),
    )
    .unwrap();
}

fn config_for(dir: &TempDir) -> GeneratorConfig {
    GeneratorConfig {
        template_root: dir.path().to_path_buf(),
        class_name: "WordCountJob".to_string(),
        package_name: "org.demo.generated".to_string(),
        output_root: dir.path().join("generated-src"),
        ..Default::default()
    }
}

fn wordcount_graph() -> MemoryGraph {
    let mut graph = MemoryGraph::new();
    graph
        .add_workflow_input("in")
        .add_workflow_output("result")
        .add_stage("wordcount", BEANSHELL, &["input"], &["output"])
        .set_stage_property("wordcount", "script", "count(\"words\")")
        .link(
            PortRef::WorkflowInput("in".to_string()),
            PortRef::StageInput {
                stage: "wordcount".to_string(),
                port: "input".to_string(),
            },
        )
        .link(
            PortRef::StageOutput {
                stage: "wordcount".to_string(),
                port: "output".to_string(),
            },
            PortRef::WorkflowOutput("result".to_string()),
        );
    graph
}

#[test]
fn converts_wordcount_workflow_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_template_tree(&dir);
    let config = config_for(&dir);
    let mapping = TemplateMapping::load(&config.mapping_path()).unwrap();
    let registry = StageKindRegistry::with_defaults();
    let driver = Driver::new(&config, &registry, &mapping);

    let output = driver.convert(&wordcount_graph()).unwrap();
    assert_eq!(
        output,
        dir.path()
            .join("generated-src/org/demo/generated/WordCountJob.java")
    );

    let source = fs::read_to_string(&output).unwrap();
    assert!(source.starts_with("package org.demo.generated;\n"));
    assert!(source.contains("public class WordCountJob {"));
    assert!(source.contains("static class wordcountMap"));
    assert!(source.contains("String script = \"count(\\\"words\\\")\";"));
    assert!(source.contains(
        "runJob(\"wordcount_input\", \"result\", \"TextInputFormat\", \"TextOutputFormat\");"
    ));
    // Imports from the wrapper and both fragments, sorted and deduplicated.
    assert!(source.contains(
        "import bsh.Interpreter;\nimport org.apache.hadoop.conf.Configuration;\nimport org.apache.hadoop.mapreduce.Mapper;\n"
    ));
    // requires-imports directives are deleted from the output.
    assert!(!source.contains("requiresimports"));
    assert!(!source.contains("requires imports"));
}

#[test]
fn conversion_is_deterministic() {
    let dir = TempDir::new().unwrap();
    write_template_tree(&dir);
    let config = config_for(&dir);
    let mapping = TemplateMapping::load(&config.mapping_path()).unwrap();
    let registry = StageKindRegistry::with_defaults();
    let driver = Driver::new(&config, &registry, &mapping);

    let first = fs::read_to_string(driver.convert(&wordcount_graph()).unwrap()).unwrap();
    let second = fs::read_to_string(driver.convert(&wordcount_graph()).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn two_stage_chain_wires_intermediate_paths() {
    let dir = TempDir::new().unwrap();
    write_template_tree(&dir);
    let config = config_for(&dir);
    let mapping = TemplateMapping::load(&config.mapping_path()).unwrap();
    let registry = StageKindRegistry::with_defaults();
    let driver = Driver::new(&config, &registry, &mapping);

    let mut graph = MemoryGraph::new();
    graph
        .add_workflow_input("in")
        .add_workflow_output("result")
        .add_stage("tokenize", BEANSHELL, &["input"], &["output"])
        .add_stage("count", BEANSHELL, &["words"], &["output"])
        .set_stage_property("tokenize", "script", "split()")
        .set_stage_property("count", "script", "tally()")
        .link(
            PortRef::WorkflowInput("in".to_string()),
            PortRef::StageInput {
                stage: "tokenize".to_string(),
                port: "input".to_string(),
            },
        )
        .link(
            PortRef::StageOutput {
                stage: "tokenize".to_string(),
                port: "output".to_string(),
            },
            PortRef::StageInput {
                stage: "count".to_string(),
                port: "words".to_string(),
            },
        )
        .link(
            PortRef::StageOutput {
                stage: "count".to_string(),
                port: "output".to_string(),
            },
            PortRef::WorkflowOutput("result".to_string()),
        );

    let source = fs::read_to_string(driver.convert(&graph).unwrap()).unwrap();
    // tokenize forwards into count's input port; count forwards to the sink.
    assert!(source.contains("runJob(\"tokenize_input\", \"count_words\","));
    assert!(source.contains("runJob(\"count_words\", \"result\","));
    // Pipeline order: tokenize's run call comes before count's.
    let tokenize_pos = source.find("runJob(\"tokenize_input\"").unwrap();
    let count_pos = source.find("runJob(\"count_words\", \"result\"").unwrap();
    assert!(tokenize_pos < count_pos);
}

#[test]
fn cyclic_workflow_fails_before_any_write() {
    let dir = TempDir::new().unwrap();
    write_template_tree(&dir);
    let config = config_for(&dir);
    let mapping = TemplateMapping::load(&config.mapping_path()).unwrap();
    let registry = StageKindRegistry::with_defaults();
    let driver = Driver::new(&config, &registry, &mapping);

    let mut graph = MemoryGraph::new();
    graph
        .add_workflow_input("in")
        .add_workflow_output("result")
        .add_stage("a", BEANSHELL, &["input"], &["output"])
        .add_stage("b", BEANSHELL, &["input"], &["output"])
        .link(
            PortRef::StageOutput {
                stage: "a".to_string(),
                port: "output".to_string(),
            },
            PortRef::StageInput {
                stage: "b".to_string(),
                port: "input".to_string(),
            },
        )
        .link(
            PortRef::StageOutput {
                stage: "b".to_string(),
                port: "output".to_string(),
            },
            PortRef::StageInput {
                stage: "a".to_string(),
                port: "input".to_string(),
            },
        )
        .link(
            PortRef::StageOutput {
                stage: "b".to_string(),
                port: "output".to_string(),
            },
            PortRef::WorkflowOutput("result".to_string()),
        );

    let err = driver.convert(&graph).unwrap_err();
    assert!(matches!(err, FlowgenError::CyclicGraph { .. }));
    assert!(!config.output_file().exists());
}

#[test]
fn missing_fragment_template_aborts_without_output() {
    let dir = TempDir::new().unwrap();
    write_template_tree(&dir);
    fs::remove_file(dir.path().join("beanshell-activity-run.jtemp")).unwrap();
    let config = config_for(&dir);
    let mapping = TemplateMapping::load(&config.mapping_path()).unwrap();
    let registry = StageKindRegistry::with_defaults();
    let driver = Driver::new(&config, &registry, &mapping);

    let err = driver.convert(&wordcount_graph()).unwrap_err();
    assert!(matches!(err, FlowgenError::TemplateNotFound { .. }));
    assert!(!config.output_file().exists());
}

#[test]
fn unresolved_variable_survives_into_output_verbatim() {
    let dir = TempDir::new().unwrap();
    write_template_tree(&dir);
    fs::write(
        dir.path().join("hadoop-wrapper.jtemp"),
        "class <%= hadoopClassName %> { /* <%= notAVariable %> */ }\n<%@ include mapreduce %>\n<%@ include run %>\n",
    )
    .unwrap();
    let config = config_for(&dir);
    let mapping = TemplateMapping::load(&config.mapping_path()).unwrap();
    let registry = StageKindRegistry::with_defaults();
    let driver = Driver::new(&config, &registry, &mapping);

    let source = fs::read_to_string(driver.convert(&wordcount_graph()).unwrap()).unwrap();
    assert!(source.contains("class WordCountJob"));
    assert!(source.contains("<%= notAVariable %>"));
}
