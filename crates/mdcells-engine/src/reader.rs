//! Markdown → notebook document.

use tracing::debug;

use crate::assemble::{AssemblyError, assemble};
use crate::attributes::{AttributeDialect, Attributes};
use crate::cells::Document;
use crate::classify::{
    Classified, ClassifiedCode, ClassifyOptions, DEFAULT_LANGUAGE, MatchPolicy, Role, classify,
};
use crate::segment::{Block, Grammar, segment};

/// Reader configuration, immutable for the reader's lifetime.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Which code-span grammars to scan for.
    pub grammar: Grammar,
    /// Literal code injected as a synthetic first cell, e.g.
    /// `%matplotlib inline`.
    pub precode: String,
    /// Prepend execution directives for non-default languages.
    pub magic: bool,
    pub match_policy: MatchPolicy,
    pub extract_captions: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            grammar: Grammar::Both,
            precode: String::new(),
            magic: true,
            match_policy: MatchPolicy::All,
            extract_captions: false,
        }
    }
}

/// Imports markdown text as a notebook document.
///
/// The markdown is split into code and narrative blocks; code blocks become
/// code cells and narrative blocks become markdown cells.
#[derive(Debug, Clone, Default)]
pub struct MarkdownReader {
    options: ReadOptions,
}

impl MarkdownReader {
    pub fn new(options: ReadOptions) -> Self {
        MarkdownReader { options }
    }

    pub fn read(&self, text: &str) -> Result<Document, AssemblyError> {
        debug!(bytes = text.len(), "reading markdown");
        let blocks = segment(text, &self.options.grammar);
        let dialect = detect_dialect(&blocks);

        let classify_options = ClassifyOptions {
            match_policy: self.options.match_policy.clone(),
            magic: self.options.magic,
            extract_captions: self.options.extract_captions,
        };

        let mut classified: Vec<Classified> = blocks
            .into_iter()
            .map(|block| match block {
                Block::Narrative(narrative) => Classified::Narrative(narrative.content),
                Block::Code(code) => classify(&code, &classify_options),
            })
            .collect();

        let precode = self.options.precode.trim_matches('\n');
        if !precode.is_empty() {
            classified.insert(
                0,
                Classified::Code(ClassifiedCode {
                    content: precode.to_string(),
                    language: DEFAULT_LANGUAGE.to_string(),
                    role: Role::Input,
                    attributes: Attributes::default(),
                }),
            );
        }

        let cells = assemble(classified)?;
        debug!(cells = cells.len(), "assembled document");
        Ok(Document {
            cells,
            metadata: serde_json::Map::new(),
            dialect,
        })
    }
}

/// The attribute dialect is fixed once per conversion, from the first code
/// block that carries an attribute string.
fn detect_dialect(blocks: &[Block]) -> AttributeDialect {
    blocks
        .iter()
        .find_map(|block| match block {
            Block::Code(code) => AttributeDialect::detect(&code.attr_text),
            Block::Narrative(_) => None,
        })
        .unwrap_or_default()
}
