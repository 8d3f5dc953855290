//! Decides what a segmented code block actually is: which cells it may
//! become (match policy), whether it is input or captured output, and which
//! language it runs in.

use std::str::FromStr;

use crate::attributes::Attributes;
use crate::segment::CodeBlock;

/// Languages recognized in attribute classes.
pub const LANGUAGES: [&str; 4] = ["python", "r", "ruby", "bash"];

/// The language code cells default to when none is tagged.
pub const DEFAULT_LANGUAGE: &str = "python";

/// Ordered alias table mapping a language name to its execution directive.
/// Languages not listed get a directive built from the name itself.
/// Extending to a new language is a table edit.
const MAGIC_ALIASES: &[(&str, &str)] = &[("r", "%%R\n"), ("R", "%%R\n")];

/// Which code spans get promoted to code cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Every code block, fenced or indented.
    #[default]
    All,
    /// Indented blocks are demoted back to narrative text.
    FencedOnly,
    /// Only blocks explicitly tagged with the `input` class.
    StrictInput,
    /// Only blocks whose attribute classes contain the given name.
    Class(String),
}

impl MatchPolicy {
    /// Interpret a policy word: the known policy names, or anything else
    /// as a class name to match on.
    pub fn from_word(word: &str) -> Self {
        match word {
            "all" => MatchPolicy::All,
            "fenced" => MatchPolicy::FencedOnly,
            "strict" => MatchPolicy::StrictInput,
            other => MatchPolicy::Class(other.to_string()),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(MatchPolicy::from_word(s))
    }
}

/// Whether a code block supplies source to run or captured results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    Output,
}

/// A code block that survived classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedCode {
    pub content: String,
    pub language: String,
    pub role: Role,
    pub attributes: Attributes,
}

/// Classification result: a code cell candidate, or a demotion back to
/// narrative text.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Code(ClassifiedCode),
    Narrative(String),
}

#[derive(Debug, Clone, Default)]
pub struct ClassifyOptions {
    pub match_policy: MatchPolicy,
    /// Prepend an execution directive when the language is not the default.
    pub magic: bool,
    /// Derive a figure id and caption from leading comment lines.
    pub extract_captions: bool,
}

/// Classify one code block under the given options.
pub fn classify(block: &CodeBlock, options: &ClassifyOptions) -> Classified {
    let mut attrs = Attributes::parse(&block.attr_text);

    match &options.match_policy {
        MatchPolicy::All => {}
        MatchPolicy::FencedOnly => {
            if let Some(indent) = &block.indent {
                // Re-wrap with the literal indent markers preserved as text.
                return Classified::Narrative(format!("\n{}\n", indent.source));
            }
        }
        MatchPolicy::StrictInput => {
            if !attrs.classes.iter().any(|c| c == "input") {
                return Classified::Narrative(block.raw.clone());
            }
        }
        MatchPolicy::Class(name) => {
            if !attrs.classes.iter().any(|c| c == name) {
                return Classified::Narrative(block.raw.clone());
            }
        }
    }

    let role = derive_role(&mut attrs);

    let mut content = block.content.clone();
    if options.extract_captions
        && let Some((id, caption)) = caption_comments(&content)
    {
        attrs.identifier = id;
        attrs.set("caption", caption);
    }

    let tagged = attrs
        .classes
        .iter()
        .position(|c| LANGUAGES.contains(&c.as_str()))
        .map(|i| attrs.classes.remove(i));

    let language = match tagged {
        None => DEFAULT_LANGUAGE.to_string(),
        Some(lang) if lang == "python" || lang == "py" => DEFAULT_LANGUAGE.to_string(),
        Some(lang) => {
            if options.magic {
                content.insert_str(0, &magic_directive(&lang));
            }
            lang
        }
    };

    Classified::Code(ClassifiedCode {
        content,
        language,
        role,
        attributes: attrs,
    })
}

/// Output cells carry both `output` and `json` tags; an explicit `input`
/// tag is consumed; everything else defaults to input.
fn derive_role(attrs: &mut Attributes) -> Role {
    let has = |name: &str| attrs.classes.iter().any(|c| c == name);
    if has("output") && has("json") {
        Role::Output
    } else {
        if let Some(i) = attrs.classes.iter().position(|c| c == "input") {
            attrs.classes.remove(i);
        }
        Role::Input
    }
}

/// The directive line signalling a non-default execution language.
pub fn magic_directive(language: &str) -> String {
    MAGIC_ALIASES
        .iter()
        .find(|(alias, _)| *alias == language)
        .map(|(_, directive)| (*directive).to_string())
        .unwrap_or_else(|| format!("%%{language}\n"))
}

/// Retrieve a figure id and caption from a code block that starts with a
/// commented header:
///
/// ```text
/// ## fig:id
/// # multi-line or single-line
/// # caption
/// ```
///
/// The caption lines are joined with spaces and surrounded with quotes.
fn caption_comments(content: &str) -> Option<(String, String)> {
    if !content.starts_with("## fig:") {
        return None;
    }
    let mut lines = content.lines();
    let id = lines.next()?.trim_matches(['#', ' ']).to_string();

    let mut words = Vec::new();
    for line in lines {
        if !line.starts_with("# ") || line.starts_with("##") {
            break;
        }
        words.push(line.trim_start_matches(['#', ' ']).trim_end());
    }
    Some((id, format!("\"{}\"", words.join(" "))))
}
