use std::path::Path;

/// The two document formats the converter knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Markdown,
    Notebook,
}

/// Extensions treated as markdown input.
pub const MARKDOWN_EXTENSIONS: [&str; 6] = ["md", "markdown", "mkd", "mdown", "mkdn", "Rmd"];

/// Extension of the structured notebook format.
pub const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Determine the format of a file from its extension. Unrecognized
/// extensions yield `None`, never a guess.
pub fn detect(path: &Path) -> Option<Format> {
    let extension = path.extension()?.to_str()?;
    if MARKDOWN_EXTENSIONS.contains(&extension) {
        Some(Format::Markdown)
    } else if extension == NOTEBOOK_EXTENSION {
        Some(Format::Notebook)
    } else {
        None
    }
}
