/// An indentation-based code span: the detected whitespace prefix and the
/// original (undedented) body, kept so the block can be restored verbatim
/// when a match policy demotes it back to narrative text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indent {
    pub prefix: String,
    pub source: String,
}

/// Detect the indent prefix of the first line of an indented block: the full
/// leading run of spaces when it is at least four long, or a single tab.
///
/// The prefix is the first line's literal whitespace; membership of later
/// lines requires that exact prefix, so the shortest common prefix across
/// the block always equals the detected one.
pub fn indent_prefix(line: &str) -> Option<&str> {
    if line.starts_with('\t') {
        return Some(&line[..1]);
    }
    let spaces = line.len() - line.trim_start_matches(' ').len();
    if spaces >= 4 { Some(&line[..spaces]) } else { None }
}

/// Strip the exact prefix from every line that carries it. Blank lines and
/// lines with a different prefix are left untouched; lines indented further
/// keep the excess.
pub fn dedent(source: &str, prefix: &str) -> String {
    source
        .split('\n')
        .map(|line| line.strip_prefix(prefix).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}
