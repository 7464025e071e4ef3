use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info};

use flowgen::bundle;
use flowgen::config::GeneratorConfig;
use flowgen::config::TemplateMapping;
use flowgen::driver::Driver;
use flowgen::stage::StageKindRegistry;

/// Compile a dataflow workflow into batch-pipeline source code
#[derive(Parser)]
#[command(name = "flowgen", version)]
#[command(about = "Compile a dataflow workflow into batch-pipeline source code", long_about = None)]
struct Cli {
    /// Workflow bundle to convert (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Directory containing the template files
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Name of the kind-to-template mapping file inside the template root
    #[arg(short, long)]
    mapping: Option<String>,

    /// Class name of the generated source file
    #[arg(short = 'C', long)]
    class_name: Option<String>,

    /// Package name of the generated source file
    #[arg(short = 'P', long)]
    package_name: Option<String>,

    /// Source root the generated file is written under
    #[arg(short, long)]
    output_root: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose >= 2)
        .init();

    if let Err(e) = run(cli) {
        error!("conversion failed: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => GeneratorConfig::default(),
    };
    if let Some(templates) = cli.templates {
        config.template_root = templates;
    }
    if let Some(mapping) = cli.mapping {
        config.mapping_file = mapping;
    }
    if let Some(class_name) = cli.class_name {
        config.class_name = class_name;
    }
    if let Some(package_name) = cli.package_name {
        config.package_name = package_name;
    }
    if let Some(output_root) = cli.output_root {
        config.output_root = output_root;
    }
    debug!(?config.template_root, %config.class_name, %config.package_name, "effective configuration");

    let mapping = TemplateMapping::load(&config.mapping_path())
        .context("failed to read the kind-to-template mapping file")?;
    let registry = StageKindRegistry::with_defaults();

    let graph = bundle::load_bundle(&cli.input)
        .with_context(|| format!("failed to read workflow {}", cli.input.display()))?;

    let driver = Driver::new(&config, &registry, &mapping);
    let output = driver.convert(&graph)?;
    info!(path = %output.display(), "done");
    println!("{}", output.display());
    Ok(())
}
