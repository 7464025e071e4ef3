//! Generator configuration and the kind-to-template mapping file.
//!
//! The configuration is an explicit value constructed once and passed into the
//! linearizer, engine and driver. There is no process-wide mutable state; two
//! conversions with different configurations can run back to back without
//! interfering.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FlowgenError, Result};

/// Identity pass-through map fragment, selected when a mapping line leaves the
/// map field empty.
pub const IDENTITY_MAP_TEMPLATE: &str = "identity-map.jtemp";

/// Identity pass-through reduce fragment, selected when a mapping line leaves
/// the reduce field empty.
pub const IDENTITY_REDUCE_TEMPLATE: &str = "identity-reduce.jtemp";

/// Name of the top-level wrapper template under the template root.
pub const WRAPPER_TEMPLATE: &str = "hadoop-wrapper.jtemp";

/// Settings for one conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Directory holding all template files and the mapping file.
    pub template_root: PathBuf,
    /// Name of the mapping file inside the template root.
    pub mapping_file: String,
    /// Class name of the generated source file.
    pub class_name: String,
    /// Package name of the generated source file.
    pub package_name: String,
    /// Source root the generated file is written under.
    pub output_root: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            template_root: PathBuf::from("resources/templates"),
            mapping_file: "mapping".to_string(),
            class_name: "HadoopClass".to_string(),
            package_name: "generated.pipeline".to_string(),
            output_root: PathBuf::from("src/main/java"),
        }
    }
}

impl GeneratorConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FlowgenError::config_with_source(format!("failed to read {}", path.display()), e)
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            FlowgenError::config_with_source(format!("failed to parse {}", path.display()), e)
        })?;
        debug!(path = %path.display(), "loaded generator config");
        Ok(config)
    }

    /// Full path of the mapping file.
    pub fn mapping_path(&self) -> PathBuf {
        self.template_root.join(&self.mapping_file)
    }

    /// Path the generated source file is written to: package segments become
    /// directory segments under the output root.
    pub fn output_file(&self) -> PathBuf {
        let package_dir: PathBuf = self.package_name.split('.').collect();
        self.output_root
            .join(package_dir)
            .join(format!("{}.java", self.class_name))
    }
}

/// Map and reduce fragment templates for one stage kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindTemplates {
    pub map_template: String,
    pub reduce_template: String,
}

/// The kind-to-template mapping, read from a plain-text file with one stage
/// kind per line: `<activityKindURI>\t<mapTemplate>\t<reduceTemplate>`.
///
/// An empty map or reduce field selects the corresponding identity fragment.
#[derive(Debug, Clone, Default)]
pub struct TemplateMapping {
    entries: HashMap<String, KindTemplates>,
}

impl TemplateMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the mapping file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "reading template mapping");
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FlowgenError::TemplateNotFound {
                path: path.to_path_buf(),
            },
            _ => FlowgenError::TemplateRead {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let mut mapping = Self::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(FlowgenError::MappingParse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: "expected <kindURI>\\t<mapTemplate>\\t<reduceTemplate>".to_string(),
                });
            }
            let kind_uri = fields[0].trim();
            if kind_uri.is_empty() {
                return Err(FlowgenError::MappingParse {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    reason: "empty activity-kind field".to_string(),
                });
            }
            let map_template = fields[1].trim();
            let reduce_template = fields.get(2).map(|f| f.trim()).unwrap_or("");
            debug!(kind_uri, map_template, reduce_template, "mapping line");
            mapping.insert(kind_uri, map_template, reduce_template);
        }
        Ok(mapping)
    }

    /// Register templates for a kind. Empty fields select identity fragments.
    pub fn insert(&mut self, kind_uri: &str, map_template: &str, reduce_template: &str) {
        let map_template = if map_template.is_empty() {
            IDENTITY_MAP_TEMPLATE
        } else {
            map_template
        };
        let reduce_template = if reduce_template.is_empty() {
            IDENTITY_REDUCE_TEMPLATE
        } else {
            reduce_template
        };
        self.entries.insert(
            kind_uri.to_string(),
            KindTemplates {
                map_template: map_template.to_string(),
                reduce_template: reduce_template.to_string(),
            },
        );
    }

    /// Look up the templates for a kind URI.
    pub fn templates_for(&self, kind_uri: &str) -> Option<&KindTemplates> {
        self.entries.get(kind_uri)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
