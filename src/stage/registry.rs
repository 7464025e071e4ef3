//! Explicit table from activity-kind names to stage-config factories.
//!
//! Replaces the runtime class-loading of the original converter: every
//! supported kind is registered up front, and resolving an unknown kind fails
//! the whole translation instead of silently dropping the stage.

use std::collections::HashMap;

use tracing::debug;

use super::{BeanshellStage, StageConfig};
use crate::error::{FlowgenError, Result};
use crate::graph::PropertySource;

/// Factory producing a fresh, not-yet-ingested config for one stage.
/// Arguments: stage name, activity-kind URI.
pub type StageFactory = Box<dyn Fn(&str, &str) -> Box<dyn StageConfig> + Send + Sync>;

/// Normalize an activity-kind identifier to its registry key: the last path
/// segment, first letter uppercased (`.../activity/beanshell` → `Beanshell`).
pub fn normalize_kind(kind_uri: &str) -> String {
    let segment = kind_uri.rsplit('/').next().unwrap_or(kind_uri);
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Registry of stage-kind factories.
pub struct StageKindRegistry {
    factories: HashMap<String, StageFactory>,
}

impl Default for StageKindRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl StageKindRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with all built-in kinds registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("Beanshell", Box::new(|name, kind_uri| {
            Box::new(BeanshellStage::new(name, kind_uri))
        }));
        registry
    }

    /// Register a factory under a normalized kind name.
    pub fn register(&mut self, kind: impl Into<String>, factory: StageFactory) {
        self.factories.insert(kind.into(), factory);
    }

    /// Whether a kind (by normalized name) is registered.
    pub fn supports(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Resolve a kind URI to a stage config for `stage`, ingesting the
    /// stage's configuration record.
    pub fn resolve(
        &self,
        kind_uri: &str,
        stage: &str,
        props: &dyn PropertySource,
    ) -> Result<Box<dyn StageConfig>> {
        let kind = normalize_kind(kind_uri);
        debug!(stage, kind, "resolving stage kind");
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| FlowgenError::unsupported_kind(&kind, stage))?;
        let mut config = factory(stage, kind_uri);
        config.ingest(props)?;
        Ok(config)
    }
}
