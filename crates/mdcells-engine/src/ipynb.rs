//! The on-disk notebook document format (nbformat v4 compatible JSON).
//!
//! The rest of the engine only manipulates [`Document`] values; this module
//! is the single place that knows the JSON layout. Output is rendered with
//! one-space indentation and key-sorted objects so written notebooks diff
//! cleanly.

use std::io::{Read, Write};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::attributes::Attributes;
use crate::cells::{Cell, CodeCell, Document, MarkdownCell};
use crate::classify::DEFAULT_LANGUAGE;

pub const NBFORMAT: u64 = 4;
pub const NBFORMAT_MINOR: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("invalid notebook JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported cell type '{0}'")]
    UnsupportedCellType(String),
    #[error("unsupported notebook format version {0}")]
    UnsupportedVersion(u64),
    #[error("i/o error reading or writing notebook: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse notebook JSON into a document.
pub fn read_str(text: &str) -> Result<Document, NotebookError> {
    let value: Value = serde_json::from_str(text)?;

    let version = value.get("nbformat").and_then(Value::as_u64).unwrap_or(0);
    if version != NBFORMAT {
        return Err(NotebookError::UnsupportedVersion(version));
    }

    let metadata = value
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut cells = Vec::new();
    for raw in value
        .get("cells")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        cells.push(cell_from_value(raw)?);
    }

    Ok(Document {
        cells,
        metadata,
        ..Document::default()
    })
}

pub fn from_reader(mut reader: impl Read) -> Result<Document, NotebookError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    read_str(&text)
}

/// Render a document as notebook JSON.
pub fn write_str(document: &Document) -> Result<String, NotebookError> {
    let mut root = Map::new();
    root.insert(
        "cells".to_string(),
        Value::Array(document.cells.iter().map(cell_to_value).collect()),
    );
    root.insert(
        "metadata".to_string(),
        Value::Object(document.metadata.clone()),
    );
    root.insert("nbformat".to_string(), NBFORMAT.into());
    root.insert("nbformat_minor".to_string(), NBFORMAT_MINOR.into());
    Ok(to_pretty_json(&Value::Object(root))?)
}

pub fn to_writer(mut writer: impl Write, document: &Document) -> Result<(), NotebookError> {
    let text = write_str(document)?;
    writer.write_all(text.as_bytes())?;
    Ok(())
}

fn cell_from_value(raw: &Value) -> Result<Cell, NotebookError> {
    let cell_type = raw
        .get("cell_type")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match cell_type {
        "markdown" => Ok(Cell::Markdown(MarkdownCell {
            source: source_text(raw.get("source")),
        })),
        "code" => {
            let attributes = raw
                .get("metadata")
                .and_then(|m| m.get("attributes"))
                .cloned()
                .and_then(|v| serde_json::from_value::<Attributes>(v).ok());
            Ok(Cell::Code(CodeCell {
                source: source_text(raw.get("source")),
                language: DEFAULT_LANGUAGE.to_string(),
                execution_count: raw.get("execution_count").and_then(Value::as_i64),
                outputs: raw
                    .get("outputs")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                attributes,
            }))
        }
        other => Err(NotebookError::UnsupportedCellType(other.to_string())),
    }
}

fn cell_to_value(cell: &Cell) -> Value {
    let mut map = Map::new();
    match cell {
        Cell::Markdown(markdown) => {
            map.insert("cell_type".to_string(), "markdown".into());
            map.insert("metadata".to_string(), Value::Object(Map::new()));
            map.insert("source".to_string(), source_lines(&markdown.source));
        }
        Cell::Code(code) => {
            map.insert("cell_type".to_string(), "code".into());
            map.insert(
                "execution_count".to_string(),
                code.execution_count.map_or(Value::Null, Value::from),
            );
            let mut metadata = Map::new();
            if let Some(attrs) = &code.attributes
                && let Ok(value) = serde_json::to_value(attrs)
            {
                metadata.insert("attributes".to_string(), value);
            }
            map.insert("metadata".to_string(), Value::Object(metadata));
            map.insert("outputs".to_string(), Value::Array(code.outputs.clone()));
            map.insert("source".to_string(), source_lines(&code.source));
        }
    }
    Value::Object(map)
}

/// Accept both representations the format allows: a plain string, or the
/// conventional array of newline-terminated lines.
fn source_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

/// Split source into the line-array form, each line keeping its newline
/// except the last.
fn source_lines(source: &str) -> Value {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            lines.push(Value::String(source[start..=i].to_string()));
            start = i + 1;
        }
    }
    if start < source.len() {
        lines.push(Value::String(source[start..].to_string()));
    }
    Value::Array(lines)
}

/// JSON with one-space indentation. Objects come out key-sorted because the
/// underlying map is ordered.
pub(crate) fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_document() -> Document {
        let mut code = CodeCell::new("print(1)\nprint(2)");
        code.execution_count = Some(1);
        code.outputs = vec![json!({"output_type": "stream", "text": "1\n2\n"})];
        code.attributes = Some(Attributes::parse("{#fig:a .input n=1}"));
        Document::new(vec![
            Cell::Markdown(MarkdownCell {
                source: "# Title\n\nwords".to_string(),
            }),
            Cell::Code(code),
        ])
    }

    #[test]
    fn write_read_round_trip_preserves_cells() {
        let doc = sample_document();
        let text = write_str(&doc).unwrap();
        let back = read_str(&text).unwrap();
        assert_eq!(back.cells, doc.cells);
    }

    #[test]
    fn source_array_and_string_forms_read_the_same() {
        let array_form = r#"{
 "cells": [
  {"cell_type": "markdown", "metadata": {}, "source": ["line one\n", "line two"]}
 ],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 2
}"#;
        let string_form = r#"{
 "cells": [
  {"cell_type": "markdown", "metadata": {}, "source": "line one\nline two"}
 ],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 2
}"#;
        let a = read_str(array_form).unwrap();
        let b = read_str(string_form).unwrap();
        assert_eq!(a.cells, b.cells);
    }

    #[test]
    fn unknown_cell_type_is_an_explicit_error() {
        let text = r#"{
 "cells": [{"cell_type": "raw", "metadata": {}, "source": []}],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 2
}"#;
        let err = read_str(text).unwrap_err();
        assert!(matches!(err, NotebookError::UnsupportedCellType(t) if t == "raw"));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let text = r#"{"cells": [], "metadata": {}, "nbformat": 3, "nbformat_minor": 0}"#;
        let err = read_str(text).unwrap_err();
        assert!(matches!(err, NotebookError::UnsupportedVersion(3)));
    }

    #[test]
    fn execution_count_serializes_as_null_when_unset() {
        let doc = Document::new(vec![Cell::Code(CodeCell::new("x"))]);
        let text = write_str(&doc).unwrap();
        assert!(text.contains("\"execution_count\": null"));
    }

    #[test]
    fn source_lines_keep_newlines_except_last() {
        assert_eq!(
            source_lines("a\nb\nc"),
            json!(["a\n", "b\n", "c"])
        );
        assert_eq!(source_lines("a\n"), json!(["a\n"]));
        assert_eq!(source_lines(""), json!([]));
    }

    #[test]
    fn output_is_key_sorted_with_one_space_indent() {
        let text = to_pretty_json(&json!({"b": 1, "a": [1, 2]})).unwrap();
        assert_eq!(text, "{\n \"a\": [\n  1,\n  2\n ],\n \"b\": 1\n}");
    }
}
