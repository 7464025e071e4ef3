use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlowgenError>;

/// The unified error type for the whole generator.
///
/// Structural and graph errors are detected eagerly, before any file is
/// written, so a failed conversion never leaves a partial artifact on disk.
/// Template-resolution errors abort the enclosing translation for the same
/// reason. Unresolved single-variable references are deliberately NOT errors;
/// they are reported through [`crate::template::Expansion::unresolved`].
#[derive(Error, Debug)]
pub enum FlowgenError {
    #[error("unsupported graph shape: {reason}")]
    UnsupportedGraphShape { reason: String },

    #[error("unsupported stage kind '{kind}' for stage '{stage}'")]
    UnsupportedActivityKind { kind: String, stage: String },

    #[error("workflow graph contains a cycle through stage '{stage}'")]
    CyclicGraph { stage: String },

    #[error("template not found: {path}")]
    TemplateNotFound { path: PathBuf },

    #[error("failed to read template {path}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("include depth exceeded {depth} while expanding '{template}'")]
    IncludeDepthExceeded { template: String, depth: usize },

    #[error("malformed mapping line {line} in {path}: {reason}")]
    MappingParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid wrapper template: {reason}")]
    InvalidWrapper { reason: String },

    #[error("failed to read workflow bundle {path}: {reason}")]
    Bundle { path: PathBuf, reason: String },

    #[error("configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("failed to write generated source to {path}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FlowgenError {
    /// Create an unsupported-graph-shape error.
    pub fn shape(reason: impl Into<String>) -> Self {
        Self::UnsupportedGraphShape {
            reason: reason.into(),
        }
    }

    /// Create an unsupported-activity-kind error.
    pub fn unsupported_kind(kind: impl Into<String>, stage: impl Into<String>) -> Self {
        Self::UnsupportedActivityKind {
            kind: kind.into(),
            stage: stage.into(),
        }
    }

    /// Create a cyclic-graph error naming one stage on the cycle.
    pub fn cyclic(stage: impl Into<String>) -> Self {
        Self::CyclicGraph {
            stage: stage.into(),
        }
    }

    /// Create a configuration error without a source.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error wrapping an underlying cause.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error was raised before anything was written to disk.
    ///
    /// Every variant except [`FlowgenError::OutputWrite`] is pre-write.
    pub fn is_pre_write(&self) -> bool {
        !matches!(self, Self::OutputWrite { .. })
    }
}
