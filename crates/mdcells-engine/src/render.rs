//! Notebook document → markdown, the approximate inverse of the reader.

use std::fs;
use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use tracing::debug;

use crate::attributes::{AttrOrder, AttributeDialect};
use crate::cells::{Cell, CodeCell, Document};
use crate::ipynb::to_pretty_json;
use crate::segment::trim_blank_edges;

/// The document template cells are rendered through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Template {
    /// Round-trip form: outputs become `{.json .output}` fences that read
    /// back losslessly.
    #[default]
    Markdown,
    /// Rendered form: outputs become figures and text blocks for direct
    /// display.
    MarkdownOutputs,
}

#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Emit no output blocks and degrade attribute strings to the bare
    /// language word.
    pub strip_outputs: bool,
    /// Extract binary output payloads to files under `output_dir`.
    pub write_resources: bool,
    pub output_dir: PathBuf,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            strip_outputs: false,
            write_resources: false,
            output_dir: PathBuf::from("figures"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("failed to serialize outputs as JSON: {0}")]
    OutputJson(#[from] serde_json::Error),
    #[error("failed to decode base64 payload for resource {name}: {source}")]
    ResourceDecode {
        name: String,
        source: base64::DecodeError,
    },
    #[error("failed to write resource {path}: {source}")]
    ResourceIo {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Writes a notebook document back into markdown.
#[derive(Debug, Clone, Default)]
pub struct MarkdownWriter {
    template: Template,
    options: WriteOptions,
}

impl MarkdownWriter {
    pub fn new(template: Template, options: WriteOptions) -> Self {
        MarkdownWriter { template, options }
    }

    pub fn write(&self, document: &Document) -> Result<String, WriteError> {
        debug!(cells = document.cells.len(), "rendering markdown");
        let mut parts = Vec::new();
        for cell in &document.cells {
            match cell {
                Cell::Markdown(markdown) => parts.push(markdown.source.clone()),
                Cell::Code(code) => parts.push(self.render_code(code, document.dialect)?),
            }
        }

        if self.options.write_resources {
            self.write_resources(document)?;
        }

        // The template layer joins cells with blank lines; anything it left
        // at the edges is not document content.
        let mut text = trim_blank_edges(&parts.join("\n\n"));
        if !text.is_empty() {
            text.push('\n');
        }
        Ok(text)
    }

    fn render_code(
        &self,
        cell: &CodeCell,
        dialect: AttributeDialect,
    ) -> Result<String, WriteError> {
        let attr = self.input_attribute_string(cell, dialect);
        let mut block = format!("```{attr}\n{}\n```", cell.source);
        if !self.options.strip_outputs && !cell.outputs.is_empty() {
            match self.template {
                Template::Markdown => {
                    block.push('\n');
                    block.push_str(&self.output_codeblock(cell)?);
                }
                Template::MarkdownOutputs => {
                    block.push_str(&render_outputs_as_markdown(cell));
                }
            }
        }
        Ok(block)
    }

    /// The attribute string for an input fence. Language and role classes
    /// go first so syntax highlighters pick the language up.
    fn input_attribute_string(&self, cell: &CodeCell, dialect: AttributeDialect) -> String {
        if self.options.strip_outputs {
            return cell.language.clone();
        }
        let plain = cell.attributes.is_none() && cell.execution_count.is_none();
        if plain && dialect == AttributeDialect::Bare {
            // Reproduce the source document's bare syntax.
            return cell.language.clone();
        }

        let mut attrs = cell.attributes.clone().unwrap_or_default();
        attrs
            .classes
            .retain(|c| c != &cell.language && c != "input");
        attrs.classes.insert(0, cell.language.clone());
        attrs.classes.insert(1, "input".to_string());
        if let Some(n) = cell.execution_count {
            attrs.set("n", n.to_string());
        }
        attrs.to_markdown(AttrOrder::ClassesFirst)
    }

    fn output_codeblock(&self, cell: &CodeCell) -> Result<String, WriteError> {
        let contents = to_pretty_json(&cell.outputs)?;
        let count = cell
            .execution_count
            .map(|n| format!(" n={n}"))
            .unwrap_or_default();
        Ok(format!("```{{.json .output{count}}}\n{contents}\n```"))
    }

    fn write_resources(&self, document: &Document) -> Result<(), WriteError> {
        let mut written = 0usize;
        for (cell_index, cell) in document.cells.iter().enumerate() {
            let Cell::Code(code) = cell else { continue };
            for (output_index, output) in code.outputs.iter().enumerate() {
                let Some(data) = output.get("data").and_then(Value::as_object) else {
                    continue;
                };
                for (mime, payload) in data {
                    let Some(extension) = binary_extension(mime) else {
                        continue;
                    };
                    let name = format!("output_{cell_index}_{output_index}.{extension}");
                    let bytes = BASE64
                        .decode(data_text(payload).replace('\n', ""))
                        .map_err(|source| WriteError::ResourceDecode {
                            name: name.clone(),
                            source,
                        })?;
                    fs::create_dir_all(&self.options.output_dir).map_err(|source| {
                        WriteError::ResourceIo {
                            path: self.options.output_dir.clone(),
                            source,
                        }
                    })?;
                    let path = self.options.output_dir.join(&name);
                    fs::write(&path, bytes)
                        .map_err(|source| WriteError::ResourceIo { path, source })?;
                    written += 1;
                }
            }
        }
        debug!(written, "extracted output resources");
        Ok(())
    }
}

/// Render outputs for direct display: images as data-URI figures, text as
/// plain fenced blocks.
fn render_outputs_as_markdown(cell: &CodeCell) -> String {
    let caption = cell
        .attributes
        .as_ref()
        .and_then(|attrs| attrs.get("caption"))
        .map(dequote)
        .unwrap_or_default();

    let mut rendered = String::new();
    for output in &cell.outputs {
        if let Some(part) = render_output(output, &caption) {
            rendered.push_str("\n\n");
            rendered.push_str(&part);
        }
    }
    rendered
}

fn render_output(output: &Value, caption: &str) -> Option<String> {
    if output.get("output_type").and_then(Value::as_str) == Some("stream") {
        let text = data_text(output.get("text")?);
        return Some(format!("```\n{}\n```", text.trim_end_matches('\n')));
    }
    let data = output.get("data").and_then(Value::as_object)?;
    for (mime, payload) in data {
        if binary_extension(mime).is_some() || mime == "image/svg+xml" {
            let uri = data_uri(mime, &data_text(payload));
            return Some(format!("![{caption}]({uri})"));
        }
    }
    let text = data_text(data.get("text/plain")?);
    Some(format!("```\n{}\n```", text.trim_end_matches('\n')))
}

/// Base64 data into a data URI for the given mime type.
fn data_uri(mime: &str, data: &str) -> String {
    format!("data:{mime};base64,{}", data.replace('\n', ""))
}

/// Payload text, whether stored as a string or an array of lines.
fn data_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

/// Remove matching surrounding quotes from a string.
fn dequote(s: &str) -> String {
    let bytes = s.as_bytes();
    if s.len() >= 2
        && bytes[0] == bytes[s.len() - 1]
        && (bytes[0] == b'"' || bytes[0] == b'\'')
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn binary_extension(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attributes;
    use crate::cells::MarkdownCell;
    use crate::reader::MarkdownReader;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn cell_with_outputs() -> CodeCell {
        let mut code = CodeCell::new("print(1)");
        code.execution_count = Some(3);
        code.outputs = vec![json!({"output_type": "stream", "text": "1\n"})];
        code
    }

    #[test]
    fn markdown_cells_render_verbatim_joined_by_blank_lines() {
        let doc = Document::new(vec![
            Cell::Markdown(MarkdownCell {
                source: "# One".to_string(),
            }),
            Cell::Markdown(MarkdownCell {
                source: "two\nlines".to_string(),
            }),
        ]);
        let writer = MarkdownWriter::default();
        assert_eq!(writer.write(&doc).unwrap(), "# One\n\ntwo\nlines\n");
    }

    #[test]
    fn stripped_cell_renders_bare_language() {
        let doc = Document::new(vec![Cell::Code(cell_with_outputs())]);
        let writer = MarkdownWriter::new(
            Template::Markdown,
            WriteOptions {
                strip_outputs: true,
                ..WriteOptions::default()
            },
        );
        assert_eq!(writer.write(&doc).unwrap(), "```python\nprint(1)\n```\n");
    }

    #[test]
    fn stripped_output_never_comes_back() {
        let doc = Document::new(vec![Cell::Code(cell_with_outputs())]);
        let writer = MarkdownWriter::new(
            Template::Markdown,
            WriteOptions {
                strip_outputs: true,
                ..WriteOptions::default()
            },
        );
        let text = writer.write(&doc).unwrap();
        assert!(!text.contains("output"));

        let back = MarkdownReader::default().read(&text).unwrap();
        let Cell::Code(code) = &back.cells[0] else {
            panic!("expected code cell");
        };
        assert!(code.outputs.is_empty());
    }

    #[test]
    fn outputs_render_as_json_fence_with_count() {
        let doc = Document::new(vec![Cell::Code(cell_with_outputs())]);
        let writer = MarkdownWriter::default();
        let text = writer.write(&doc).unwrap();
        assert_eq!(
            text,
            "```{.python .input n=3}\nprint(1)\n```\n```{.json .output n=3}\n[\n {\n  \"output_type\": \"stream\",\n  \"text\": \"1\\n\"\n }\n]\n```\n"
        );
    }

    #[test]
    fn output_fence_omits_count_when_unset() {
        let mut code = cell_with_outputs();
        code.execution_count = None;
        let doc = Document::new(vec![Cell::Code(code)]);
        let text = MarkdownWriter::default().write(&doc).unwrap();
        assert!(text.contains("```{.json .output}\n"));
    }

    #[test]
    fn bare_dialect_plain_cell_renders_bare_language() {
        let reader = MarkdownReader::default();
        let doc = reader.read("```python\na = 1\n```\n").unwrap();
        let text = MarkdownWriter::default().write(&doc).unwrap();
        assert_eq!(text, "```python\na = 1\n```\n");
    }

    #[test]
    fn attribute_metadata_survives_rendering() {
        let mut code = CodeCell::new("x");
        code.attributes = Some(Attributes::parse("{#fig:a .magic}"));
        let doc = Document::new(vec![Cell::Code(code)]);
        let text = MarkdownWriter::default().write(&doc).unwrap();
        assert_eq!(text, "```{.python .input .magic #fig:a}\nx\n```\n");
    }

    #[test]
    fn outputs_template_renders_image_as_data_uri() {
        let mut code = CodeCell::new("plot()");
        code.execution_count = Some(1);
        code.attributes = Some(Attributes::parse("{caption=\"A plot\"}"));
        code.outputs = vec![json!({
            "output_type": "display_data",
            "data": {"image/png": "aGVsbG8=\n"}
        })];
        let doc = Document::new(vec![Cell::Code(code)]);
        let writer = MarkdownWriter::new(Template::MarkdownOutputs, WriteOptions::default());
        let text = writer.write(&doc).unwrap();
        assert!(text.contains("![A plot](data:image/png;base64,aGVsbG8=)"));
    }

    #[test]
    fn resources_are_extracted_to_the_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut code = cell_with_outputs();
        code.outputs = vec![json!({
            "output_type": "display_data",
            "data": {"image/png": "aGVsbG8="}
        })];
        let doc = Document::new(vec![Cell::Code(code)]);
        let writer = MarkdownWriter::new(
            Template::Markdown,
            WriteOptions {
                write_resources: true,
                output_dir: dir.path().join("out"),
                ..WriteOptions::default()
            },
        );
        writer.write(&doc).unwrap();
        let payload = fs::read(dir.path().join("out").join("output_0_0.png")).unwrap();
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn bad_base64_payload_is_a_resource_error() {
        let mut code = cell_with_outputs();
        code.outputs = vec![json!({
            "output_type": "display_data",
            "data": {"image/png": "%%% not base64 %%%"}
        })];
        let doc = Document::new(vec![Cell::Code(code)]);
        let writer = MarkdownWriter::new(
            Template::Markdown,
            WriteOptions {
                write_resources: true,
                ..WriteOptions::default()
            },
        );
        let err = writer.write(&doc).unwrap_err();
        assert!(matches!(err, WriteError::ResourceDecode { .. }));
    }
}
