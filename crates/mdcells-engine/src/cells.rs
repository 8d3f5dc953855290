use serde_json::Value;

use crate::attributes::{AttributeDialect, Attributes};
use crate::classify::DEFAULT_LANGUAGE;

/// A single captured output record, attached verbatim to the code cell it
/// belongs to.
pub type Output = Value;

/// One notebook cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Code(CodeCell),
    Markdown(MarkdownCell),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeCell {
    pub source: String,
    pub language: String,
    pub execution_count: Option<i64>,
    pub outputs: Vec<Output>,
    /// Fence attributes the cell was read with, when any were present.
    pub attributes: Option<Attributes>,
}

impl CodeCell {
    pub fn new(source: impl Into<String>) -> Self {
        CodeCell {
            source: source.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            execution_count: None,
            outputs: Vec::new(),
            attributes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownCell {
    pub source: String,
}

/// An ordered sequence of cells produced by one conversion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub cells: Vec<Cell>,
    /// Notebook-level metadata, carried through unchanged.
    pub metadata: serde_json::Map<String, Value>,
    /// The attribute syntax family the source document used.
    pub dialect: AttributeDialect,
}

impl Document {
    pub fn new(cells: Vec<Cell>) -> Self {
        Document {
            cells,
            ..Document::default()
        }
    }

    /// Remove all outputs and reset execution counts to "not yet run".
    pub fn strip_outputs(&mut self) {
        for cell in &mut self.cells {
            if let Cell::Code(code) = cell {
                code.outputs.clear();
                code.execution_count = None;
            }
        }
    }
}
