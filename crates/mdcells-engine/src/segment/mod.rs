//! Splits raw markdown into an alternating sequence of code and narrative
//! blocks.
//!
//! Two code grammars are scanned: fenced (``` or ~~~ runs) and indented
//! (blank line, then lines indented by four spaces or a tab). When both are
//! active, fenced spans are located first over the whole text and indented
//! spans only in the gaps between them, so the grammars never double-count.
//! Segmentation always terminates with a valid partition; malformed input
//! (e.g. an unterminated fence) degrades to narrative text.

pub mod fence;
pub mod indent;

use std::ops::Range;

use regex::Regex;

pub use fence::{Fence, FenceMarker};
pub use indent::{Indent, dedent, indent_prefix};

/// Which code-span grammars the segmenter looks for.
#[derive(Debug, Clone, Default)]
pub enum Grammar {
    Fenced,
    Indented,
    #[default]
    Both,
    /// A caller-supplied pattern. Named groups `content` and `attributes`
    /// are honored when present; `indent`/`icontent` mark an
    /// indentation-style match that needs dedenting.
    Custom(Regex),
}

/// The atomic segmentation unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Code(CodeBlock),
    Narrative(NarrativeBlock),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    /// Exact source slice, used to reconstruct the block when a match
    /// policy demotes it back to narrative.
    pub raw: String,
    /// The span body, dedented for indentation-based blocks.
    pub content: String,
    pub fence: Option<Fence>,
    /// Raw text between the fence marker and the newline. Empty for
    /// indented blocks.
    pub attr_text: String,
    pub indent: Option<Indent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeBlock {
    pub content: String,
}

/// Partition `text` into code and narrative blocks.
///
/// Narrative spans lose at most one leading and one trailing blank line;
/// blocks that are empty after that are dropped, which can leave two code
/// blocks adjacent in the result.
pub fn segment(text: &str, grammar: &Grammar) -> Vec<Block> {
    let mut code_spans = match grammar {
        Grammar::Fenced => scan_fenced(text),
        Grammar::Indented => scan_indented(text),
        Grammar::Both => scan_both(text),
        Grammar::Custom(re) => scan_custom(text, re),
    };
    code_spans.sort_by_key(|(range, _)| range.start);

    let mut blocks = Vec::new();
    let mut pos = 0;
    for (range, code) in code_spans {
        if range.start > pos {
            push_narrative(&mut blocks, &text[pos..range.start]);
        }
        blocks.push(Block::Code(code));
        pos = range.end;
    }
    if pos < text.len() {
        push_narrative(&mut blocks, &text[pos..]);
    }

    blocks.retain(|block| match block {
        Block::Code(code) => !code.content.is_empty(),
        Block::Narrative(narrative) => !narrative.content.trim().is_empty(),
    });
    blocks
}

fn push_narrative(blocks: &mut Vec<Block>, gap: &str) {
    blocks.push(Block::Narrative(NarrativeBlock {
        content: trim_blank_edges(gap),
    }));
}

/// Remove at most one leading and one trailing blank line. Interior blank
/// lines are intentional formatting and stay put.
pub(crate) fn trim_blank_edges(s: &str) -> String {
    let mut lines: Vec<&str> = s.lines().collect();
    if lines.first().is_some_and(|l| l.trim().is_empty()) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

fn lines_of(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, byte) in text.bytes().enumerate() {
        if byte == b'\n' {
            lines.push(Line {
                start,
                end: i,
                text: &text[start..i],
            });
            start = i + 1;
        }
    }
    if start < text.len() {
        lines.push(Line {
            start,
            end: text.len(),
            text: &text[start..],
        });
    }
    lines
}

/// End of a line including its newline, clamped at end of input.
fn line_span_end(line: &Line, text: &str) -> usize {
    if line.end < text.len() {
        line.end + 1
    } else {
        line.end
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn scan_fenced(text: &str) -> Vec<(Range<usize>, CodeBlock)> {
    let lines = lines_of(text);
    let mut spans = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let Some((fence, attr)) = Fence::open(lines[i].text) else {
            i += 1;
            continue;
        };
        let Some(j) = (i + 1..lines.len()).find(|&j| fence.closes(lines[j].text)) else {
            // Unterminated fence: not code.
            i += 1;
            continue;
        };
        let raw_end = line_span_end(&lines[j], text);
        let content = if j == i + 1 {
            String::new()
        } else {
            text[lines[i + 1].start..lines[j - 1].end].to_string()
        };
        spans.push((
            lines[i].start..raw_end,
            CodeBlock {
                raw: text[lines[i].start..raw_end].to_string(),
                content,
                fence: Some(fence),
                attr_text: attr.to_string(),
                indent: None,
            },
        ));
        i = j + 1;
    }
    spans
}

fn scan_indented(text: &str) -> Vec<(Range<usize>, CodeBlock)> {
    let lines = lines_of(text);
    let mut spans = Vec::new();
    let mut prev_blank = false;
    let mut i = 0;
    while i < lines.len() {
        if is_blank(lines[i].text) {
            prev_blank = true;
            i += 1;
            continue;
        }
        let prefix = if prev_blank {
            indent_prefix(lines[i].text)
        } else {
            None
        };
        let Some(prefix) = prefix else {
            prev_blank = false;
            i += 1;
            continue;
        };

        // Member lines carry the exact prefix; blank lines may sit between
        // them. The block ends at the last prefixed line before a
        // non-member.
        let mut last = i;
        let mut j = i + 1;
        while j < lines.len() {
            if is_blank(lines[j].text) {
                j += 1;
            } else if lines[j].text.starts_with(prefix) {
                last = j;
                j += 1;
            } else {
                break;
            }
        }

        // The span owns the blank line that introduced it and one trailing
        // blank line; further trailing blanks belong to the narrative gap.
        let span_start = lines[i - 1].start;
        let mut span_end = line_span_end(&lines[last], text);
        let mut next = last + 1;
        if next < lines.len() && is_blank(lines[next].text) {
            span_end = line_span_end(&lines[next], text);
            next += 1;
        }

        let source = text[lines[i].start..lines[last].end].to_string();
        spans.push((
            span_start..span_end,
            CodeBlock {
                raw: text[span_start..span_end].to_string(),
                content: dedent(&source, prefix),
                fence: None,
                attr_text: String::new(),
                indent: Some(Indent {
                    prefix: prefix.to_string(),
                    source,
                }),
            },
        ));
        prev_blank = false;
        i = next;
    }
    spans
}

fn scan_both(text: &str) -> Vec<(Range<usize>, CodeBlock)> {
    let fenced = scan_fenced(text);
    let mut all = Vec::new();
    let mut pos = 0;
    for (range, code) in fenced {
        for (r, c) in scan_indented(&text[pos..range.start]) {
            all.push((pos + r.start..pos + r.end, c));
        }
        pos = range.end;
        all.push((range, code));
    }
    for (r, c) in scan_indented(&text[pos..]) {
        all.push((pos + r.start..pos + r.end, c));
    }
    all
}

fn scan_custom(text: &str, re: &Regex) -> Vec<(Range<usize>, CodeBlock)> {
    let mut spans = Vec::new();
    for caps in re.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let raw = whole.as_str().to_string();
        let attr_text = caps
            .name("attributes")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let (content, indent) = match caps.name("indent") {
            Some(prefix) => {
                let source = caps
                    .name("icontent")
                    .map_or(whole.as_str(), |m| m.as_str())
                    .to_string();
                let prefix = prefix.as_str().to_string();
                let content = dedent(&source, &prefix);
                (content, Some(Indent { prefix, source }))
            }
            None => (
                caps.name("content")
                    .map_or(whole.as_str(), |m| m.as_str())
                    .to_string(),
                None,
            ),
        };
        spans.push((
            whole.range(),
            CodeBlock {
                raw,
                content,
                fence: None,
                attr_text,
                indent,
            },
        ));
    }
    spans
}
