//! Turns classified blocks into notebook cells.

use serde_json::Value;

use crate::cells::{Cell, CodeCell, MarkdownCell};
use crate::classify::{Classified, ClassifiedCode, Role};

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    /// An output block appeared with no code cell in front of it to own it.
    #[error("output block has no preceding code cell to attach to")]
    OutputWithoutCell,
    /// An output block's content was not a JSON array of output records.
    #[error("output block does not contain a valid JSON output array: {0}")]
    OutputJson(#[from] serde_json::Error),
}

/// Assemble classified blocks, in order, into cells.
///
/// Output blocks attach to the most recently assembled code cell; that cell
/// missing (or being narrative) is a hard error, not something to drop.
pub fn assemble(blocks: Vec<Classified>) -> Result<Vec<Cell>, AssemblyError> {
    let mut cells = Vec::new();
    for block in blocks {
        match block {
            Classified::Narrative(source) => {
                cells.push(Cell::Markdown(MarkdownCell { source }));
            }
            Classified::Code(code) => match code.role {
                Role::Input => cells.push(Cell::Code(input_cell(code))),
                Role::Output => attach_outputs(&mut cells, code)?,
            },
        }
    }
    Ok(cells)
}

fn input_cell(code: ClassifiedCode) -> CodeCell {
    let execution_count = parse_count(&code.attributes.get("n"));
    CodeCell {
        source: code.content,
        language: code.language,
        execution_count,
        outputs: Vec::new(),
        attributes: if code.attributes.is_empty() {
            None
        } else {
            Some(code.attributes)
        },
    }
}

fn attach_outputs(cells: &mut [Cell], code: ClassifiedCode) -> Result<(), AssemblyError> {
    let Some(Cell::Code(target)) = cells.last_mut() else {
        return Err(AssemblyError::OutputWithoutCell);
    };
    target.outputs = serde_json::from_str::<Vec<Value>>(&code.content)?;
    // A numbered output block supplies the prompt number when the input
    // block did not carry one.
    if target.execution_count.is_none() {
        target.execution_count = parse_count(&code.attributes.get("n"));
    }
    Ok(())
}

/// Numeric `n` attribute, or unset for anything else.
fn parse_count(value: &Option<&str>) -> Option<i64> {
    value.and_then(|v| v.parse().ok())
}
