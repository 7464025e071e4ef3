//! Template expansion engine.
//!
//! Templates are plain text interleaved with `<% ... %>` placeholders. Four
//! directive kinds are recognized, classified after stripping all whitespace
//! from the raw span:
//!
//! - `<%= name %>` is a variable reference, resolved against the fixed
//!   variable map supplied by the caller. An unknown name is left verbatim
//!   and reported as unresolved; it never aborts the translation.
//! - `<%@ include file = "path" %>` loads the referenced template relative to
//!   the template root, expands it recursively and splices the result in
//!   place. An optional `| key` suffix routes the included text through the
//!   context's [`Specializer`] first, with `key` identifying the stage whose
//!   data (for example its script body) gets injected.
//! - `<%@ requires imports "a,b" %>` contributes symbols to the returned
//!   [`ImportSet`]; the directive itself is deleted from the text.
//! - `<%@ imports %>` is the render point for the aggregated import block,
//!   left in
//!   place by [`TemplateEngine::expand`] and only substituted by the root
//!   translation, after every nested template has had the chance to
//!   contribute.
//!
//! [`TemplateEngine::expand`] is a pure function of its inputs: it returns the
//! expanded text together with the imports the tree contributed, and the
//! caller merges those explicitly. No accumulator state lives on the engine.

pub mod imports;

pub use imports::ImportSet;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{FlowgenError, Result};

/// Maximum include nesting before the expansion is aborted. Runaway
/// self-inclusion fails with an error instead of exhausting the stack.
const MAX_INCLUDE_DEPTH: usize = 64;

/// Result of expanding one template tree.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    /// Expanded text. Import render points are still in place unless this
    /// came from a root translation.
    pub text: String,
    /// Imports contributed by this tree.
    pub imports: ImportSet,
    /// Raw placeholder spans that could not be resolved and were left
    /// verbatim in the text.
    pub unresolved: Vec<String>,
}

/// Capability for kind-specialized inclusion, activated only for include
/// directives that carry a `| key` parameter.
pub trait Specializer {
    /// Pre-expand `text` (the loaded include) for the stage identified by
    /// `key`, before generic expansion continues over the result.
    fn specialize(&self, template_file: &str, key: &str, text: &str) -> Result<String>;
}

/// One classified placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Directive {
    Variable(String),
    IncludeFile { path: String, key: Option<String> },
    RequiresImports(String),
    ImportsBlock,
    Unknown,
}

/// Ambient values for one translation.
#[derive(Default)]
pub struct ExpandContext<'a> {
    /// Named values for variable references. Lookup is case-insensitive;
    /// keys must be stored lowercase.
    pub variables: HashMap<String, String>,
    /// Optional specializer for parameterized inclusion.
    pub specializer: Option<&'a dyn Specializer>,
}

impl<'a> ExpandContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, normalizing the name to lowercase.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.variables.insert(name.to_lowercase(), value.into());
    }
}

/// Expands templates loaded from a configured template root.
pub struct TemplateEngine {
    template_root: PathBuf,
    placeholder_re: Regex,
}

impl TemplateEngine {
    pub fn new(template_root: impl Into<PathBuf>) -> Self {
        Self {
            template_root: template_root.into(),
            // Placeholders never span lines; `.` deliberately excludes '\n'.
            placeholder_re: Regex::new(r"<%(.*?)%>").expect("invalid placeholder pattern"),
        }
    }

    /// Load a template file by name, relative to the template root.
    pub fn load(&self, name: &str) -> Result<String> {
        let path = self.template_root.join(name);
        debug!(path = %path.display(), "loading template");
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FlowgenError::TemplateNotFound { path },
            _ => FlowgenError::TemplateRead { path, source: e },
        })
    }

    /// Expand a template: resolve variables, splice includes recursively and
    /// collect import requirements. `<%@imports%>` render points are left in
    /// place for the root translation to fill in.
    pub fn expand(&self, text: &str, ctx: &ExpandContext) -> Result<Expansion> {
        self.expand_at_depth(text, ctx, 0)
    }

    /// Translate a root template: expand, merge `seed` imports contributed by
    /// earlier fragment expansions, then render the import block last.
    pub fn translate_root(
        &self,
        text: &str,
        ctx: &ExpandContext,
        seed: ImportSet,
    ) -> Result<Expansion> {
        let mut expansion = self.expand(text, ctx)?;
        let mut imports = seed;
        imports.merge(expansion.imports);
        expansion.text = self.render_imports(&expansion.text, &imports);
        expansion.imports = imports;
        Ok(expansion)
    }

    fn expand_at_depth(&self, text: &str, ctx: &ExpandContext, depth: usize) -> Result<Expansion> {
        let mut out = text.to_string();
        let mut imports = ImportSet::new();
        let mut unresolved = Vec::new();
        let mut pos = 0;

        // Left-to-right scan. Replacements are spliced in place and the scan
        // resumes at the splice point, so directives introduced by an
        // inclusion are themselves handled before the scan moves past them.
        while let Some(found) = self.placeholder_re.find_at(&out, pos) {
            let raw = found.as_str().to_string();
            let range = found.range();
            debug!(placeholder = %raw, "found placeholder");

            match classify(&strip_whitespace(&raw)) {
                Directive::Variable(name) => match ctx.variables.get(&name.to_lowercase()) {
                    Some(value) => {
                        let value = value.clone();
                        out.replace_range(range.clone(), &value);
                        pos = range.start + value.len();
                    }
                    None => {
                        warn!(variable = %name, "could not resolve variable, leaving placeholder");
                        unresolved.push(raw);
                        pos = range.end;
                    }
                },
                Directive::IncludeFile { path, key } => {
                    if depth >= MAX_INCLUDE_DEPTH {
                        return Err(FlowgenError::IncludeDepthExceeded {
                            template: path,
                            depth: MAX_INCLUDE_DEPTH,
                        });
                    }
                    let included = self.load(&path)?;
                    let included = match (&key, ctx.specializer) {
                        (Some(key), Some(specializer)) => {
                            specializer.specialize(&path, key, &included)?
                        }
                        (Some(key), None) => {
                            warn!(template = %path, key = %key,
                                "include carries a key but no specializer is bound");
                            included
                        }
                        _ => included,
                    };
                    let nested = self.expand_at_depth(&included, ctx, depth + 1)?;
                    imports.merge(nested.imports);
                    unresolved.extend(nested.unresolved);
                    out.replace_range(range.clone(), &nested.text);
                    pos = range.start + nested.text.len();
                }
                Directive::RequiresImports(list) => {
                    debug!(imports = %list, "collecting required imports");
                    imports.extend_from_list(&list);
                    out.replace_range(range.clone(), "");
                    pos = range.start;
                }
                Directive::ImportsBlock => {
                    // Resolved last, by the root translation.
                    pos = range.end;
                }
                Directive::Unknown => {
                    warn!(placeholder = %raw, "unknown placeholder in template");
                    unresolved.push(raw);
                    pos = range.end;
                }
            }
        }

        Ok(Expansion {
            text: out,
            imports,
            unresolved,
        })
    }

    /// Replace every `<%@imports%>` render point with the rendered import
    /// block. Called once per root translation, after all expansion is done.
    pub fn render_imports(&self, text: &str, imports: &ImportSet) -> String {
        let block = imports.render();
        let mut out = text.to_string();
        let mut pos = 0;
        while let Some(found) = self.placeholder_re.find_at(&out, pos) {
            let range = found.range();
            if strip_whitespace(found.as_str()) == "<%@imports%>" {
                out.replace_range(range.clone(), &block);
                pos = range.start + block.len();
            } else {
                pos = range.end;
            }
        }
        out
    }

    /// Replace a bare `<%@name%>` directive (an inclusion point of the
    /// wrapper template) with pre-rendered text. Returns the new text and
    /// whether the point was found.
    pub fn substitute_inclusion_point(
        &self,
        text: &str,
        name: &str,
        replacement: &str,
    ) -> (String, bool) {
        let wanted = format!("<%@{name}%>");
        let mut out = text.to_string();
        let mut pos = 0;
        let mut found_any = false;
        while let Some(found) = self.placeholder_re.find_at(&out, pos) {
            let range = found.range();
            if strip_whitespace(found.as_str()) == wanted {
                out.replace_range(range.clone(), replacement);
                pos = range.start + replacement.len();
                found_any = true;
            } else {
                pos = range.end;
            }
        }
        (out, found_any)
    }
}

/// Replace variables from `vars` (lowercase keys) in `text` without touching
/// any other placeholder. Used by specializers for their pre-pass.
pub fn substitute_variables(text: &str, vars: &HashMap<String, String>) -> String {
    let re = Regex::new(r"<%(.*?)%>").expect("invalid placeholder pattern");
    let mut out = text.to_string();
    let mut pos = 0;
    while let Some(found) = re.find_at(&out, pos) {
        let range = found.range();
        if let Directive::Variable(name) = classify(&strip_whitespace(found.as_str())) {
            if let Some(value) = vars.get(&name.to_lowercase()) {
                out.replace_range(range.clone(), value);
                pos = range.start + value.len();
                continue;
            }
        }
        pos = range.end;
    }
    out
}

fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn quoted_argument(stripped: &str) -> Option<(String, usize)> {
    let open = stripped.find('"')?;
    let close_rel = stripped[open + 1..].find('"')?;
    let close = open + 1 + close_rel;
    Some((stripped[open + 1..close].to_string(), close + 1))
}

fn classify(stripped: &str) -> Directive {
    if !stripped.starts_with("<%") || !stripped.ends_with("%>") {
        return Directive::Unknown;
    }
    if stripped == "<%@imports%>" {
        return Directive::ImportsBlock;
    }
    if let Some(rest) = stripped.strip_prefix("<%=") {
        let name = &rest[..rest.len() - 2];
        if name.is_empty() {
            return Directive::Unknown;
        }
        return Directive::Variable(name.to_string());
    }
    if stripped.starts_with("<%@includefile") {
        let Some((path, after_quote)) = quoted_argument(stripped) else {
            return Directive::Unknown;
        };
        let tail = &stripped[after_quote..stripped.len() - 2];
        let key = tail
            .strip_prefix('|')
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        return Directive::IncludeFile { path, key };
    }
    if stripped.starts_with("<%@requiresimports") {
        let Some((list, _)) = quoted_argument(stripped) else {
            return Directive::Unknown;
        };
        return Directive::RequiresImports(list);
    }
    Directive::Unknown
}
