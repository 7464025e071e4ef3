//! Aggregation of import declarations collected during one translation.

use std::collections::BTreeSet;

/// The set of import symbols contributed by a translation tree.
///
/// Accumulates monotonically while templates are expanded and is rendered once
/// at the end. A `BTreeSet` gives sorted, deduplicated iteration for free, so
/// rendering is deterministic regardless of the order directives were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSet {
    symbols: BTreeSet<String>,
}

impl ImportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one symbol. Whitespace is trimmed; empty symbols are ignored.
    pub fn insert(&mut self, symbol: &str) {
        let symbol = symbol.trim();
        if !symbol.is_empty() {
            self.symbols.insert(symbol.to_string());
        }
    }

    /// Add every symbol of a comma-separated list, as written in a
    /// `requiresimports` directive.
    pub fn extend_from_list(&mut self, list: &str) {
        for symbol in list.split(',') {
            self.insert(symbol);
        }
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: ImportSet) {
        self.symbols.extend(other.symbols);
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    /// Render the import block: one `import X;` line per symbol, sorted
    /// lexicographically, newline-terminated. Empty set renders to nothing.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for symbol in &self.symbols {
            out.push_str("import ");
            out.push_str(symbol);
            out.push_str(";\n");
        }
        out
    }
}
