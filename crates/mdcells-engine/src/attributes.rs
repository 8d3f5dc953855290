use serde::{Deserialize, Serialize};

/// Parsed form of a code fence's inline attribute string.
///
/// Unifies the attribute syntaxes found in the wild: pandoc-style braces
/// (`{#id .class key=value}`) and the bare language word (```` ```python ````).
/// Class and key/value order is preserved so the string can be rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(rename = "id", default)]
    pub identifier: String,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub kvs: Vec<(String, String)>,
}

/// Which attribute syntax family a document uses.
///
/// Detected once per conversion from the first code block and carried on the
/// resulting document, rather than inferred and remembered on shared state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeDialect {
    /// A single unbraced language word, e.g. ```` ```python ````.
    #[default]
    Bare,
    /// Pandoc-style braces, e.g. ```` ```{.python .input n=1} ````.
    Braced,
}

impl AttributeDialect {
    /// Detect the dialect of a raw attribute string. Empty strings carry no
    /// signal and return `None`.
    pub fn detect(attr_string: &str) -> Option<Self> {
        let trimmed = attr_string.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.starts_with('{') {
            Some(AttributeDialect::Braced)
        } else {
            Some(AttributeDialect::Bare)
        }
    }
}

/// Ordering of the rendered attribute parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOrder {
    /// `{#id .class key=value}` — the pandoc default.
    IdFirst,
    /// `{.class #id key=value}` — language/role classes surface first, used
    /// for input cells so syntax highlighters see the language.
    ClassesFirst,
}

impl Attributes {
    /// Parse an attribute string. Never fails: malformed input under-parses
    /// to a best-effort partial result.
    pub fn parse(attr_string: &str) -> Self {
        let trimmed = attr_string.trim();
        if trimmed.is_empty() {
            return Attributes::default();
        }

        let inner = trimmed.trim_matches(['{', '}']);
        let tokens = tokenize(inner);

        // Bare language word, e.g. "python".
        if tokens.len() == 1
            && !inner.starts_with(['#', '.'])
            && !inner.contains('=')
        {
            return Attributes {
                identifier: String::new(),
                classes: tokens,
                kvs: Vec::new(),
            };
        }

        let mut attrs = Attributes::default();
        for token in tokens {
            if let Some(id) = token.strip_prefix('#') {
                // First identifier wins.
                if attrs.identifier.is_empty() {
                    attrs.identifier = id.to_string();
                }
            } else if token == "-" {
                attrs.classes.push("unnumbered".to_string());
            } else if let Some(class) = token.strip_prefix('.') {
                attrs.classes.push(class.to_string());
            } else if let Some((key, value)) = split_key_value(&token) {
                attrs.kvs.push((key, value));
            }
            // Anything else is dropped: under-parse rather than fail.
        }
        attrs
    }

    pub fn is_empty(&self) -> bool {
        self.identifier.is_empty() && self.classes.is_empty() && self.kvs.is_empty()
    }

    /// Look up a key/value pair.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.kvs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace a key/value pair, preserving the position of an
    /// existing key.
    pub fn set(&mut self, key: &str, value: String) {
        match self.kvs.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.kvs.push((key.to_string(), value)),
        }
    }

    /// Render back to a braced attribute string.
    ///
    /// Inverse of [`Attributes::parse`] modulo the part ordering requested by
    /// the caller.
    pub fn to_markdown(&self, order: AttrOrder) -> String {
        let id = if self.identifier.is_empty() {
            String::new()
        } else {
            format!("#{}", self.identifier)
        };
        let classes = self
            .classes
            .iter()
            .map(|c| format!(".{c}"))
            .collect::<Vec<_>>()
            .join(" ");
        let kvs = self
            .kvs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");

        let parts = match order {
            AttrOrder::IdFirst => [id, classes, kvs],
            AttrOrder::ClassesFirst => [classes, id, kvs],
        };
        let body = parts
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");
        format!("{{{body}}}")
    }
}

/// Split a string into whitespace-separated tokens, keeping quoted spans
/// (single or double) intact. An unbalanced quote swallows the remainder of
/// the string into the current token.
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in s.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => {
                if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                }
                current.push(ch);
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Split a token at its first `=` outside quotes. Values keep their quoting
/// verbatim so rendering reproduces the source.
fn split_key_value(token: &str) -> Option<(String, String)> {
    let mut quote: Option<char> = None;
    for (i, ch) in token.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '=' => {
                return Some((token[..i].to_string(), token[i + 1..].to_string()));
            }
            None => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_string_is_empty_attributes() {
        assert_eq!(Attributes::parse(""), Attributes::default());
        assert!(Attributes::parse("   ").is_empty());
    }

    #[test]
    fn bare_language_word() {
        let attrs = Attributes::parse("python");
        assert_eq!(attrs.classes, vec!["python"]);
        assert!(attrs.identifier.is_empty());
        assert!(attrs.kvs.is_empty());
    }

    #[test]
    fn braced_classes_and_id() {
        let attrs = Attributes::parse("{#fig:one .python .input}");
        assert_eq!(attrs.identifier, "fig:one");
        assert_eq!(attrs.classes, vec!["python", "input"]);
    }

    #[test]
    fn first_identifier_wins() {
        let attrs = Attributes::parse("{#first #second}");
        assert_eq!(attrs.identifier, "first");
    }

    #[test]
    fn lone_dash_is_unnumbered() {
        let attrs = Attributes::parse("{- .python}");
        assert_eq!(attrs.classes, vec!["unnumbered", "python"]);
    }

    #[rstest]
    #[case("{n=3}", "n", "3")]
    #[case("{caption=\"two words\"}", "caption", "\"two words\"")]
    #[case("{k='a b c'}", "k", "'a b c'")]
    fn key_values(#[case] input: &str, #[case] key: &str, #[case] value: &str) {
        let attrs = Attributes::parse(input);
        assert_eq!(attrs.get(key), Some(value));
    }

    #[test]
    fn key_value_order_preserved() {
        let attrs = Attributes::parse("{b=2 a=1}");
        assert_eq!(
            attrs.kvs,
            vec![
                ("b".to_string(), "2".to_string()),
                ("a".to_string(), "1".to_string())
            ]
        );
    }

    #[test]
    fn unbalanced_quote_becomes_single_token() {
        // Must not panic, and the remainder parses as one token.
        let attrs = Attributes::parse("{caption=\"unterminated .oops n=3}");
        assert_eq!(attrs.get("caption"), Some("\"unterminated .oops n=3"));
        assert!(attrs.classes.is_empty());
    }

    #[test]
    fn quoted_value_keeps_embedded_dots() {
        let attrs = Attributes::parse("{k=\"a .b\" .real}");
        assert_eq!(attrs.get("k"), Some("\"a .b\""));
        assert_eq!(attrs.classes, vec!["real"]);
    }

    #[test]
    fn renders_id_first() {
        let attrs = Attributes::parse("{#id .python n=1}");
        assert_eq!(attrs.to_markdown(AttrOrder::IdFirst), "{#id .python n=1}");
    }

    #[test]
    fn renders_classes_first() {
        let attrs = Attributes::parse("{#id .python .input n=1}");
        assert_eq!(
            attrs.to_markdown(AttrOrder::ClassesFirst),
            "{.python .input #id n=1}"
        );
    }

    #[test]
    fn render_parse_round_trip() {
        let attrs = Attributes::parse("{#id .python .input n=3 caption=\"a b\"}");
        let rendered = attrs.to_markdown(AttrOrder::IdFirst);
        assert_eq!(Attributes::parse(&rendered), attrs);
    }

    #[rstest]
    #[case("python", Some(AttributeDialect::Bare))]
    #[case("{.python}", Some(AttributeDialect::Braced))]
    #[case("", None)]
    fn dialect_detection(#[case] input: &str, #[case] expected: Option<AttributeDialect>) {
        assert_eq!(AttributeDialect::detect(input), expected);
    }
}
