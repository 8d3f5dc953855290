pub mod assemble;
pub mod attributes;
pub mod cells;
pub mod classify;
pub mod execute;
pub mod formats;
pub mod ipynb;
pub mod knit;
pub mod reader;
pub mod render;
pub mod segment;

// Re-export key types for easier usage
pub use assemble::AssemblyError;
pub use attributes::{AttributeDialect, Attributes};
pub use cells::{Cell, CodeCell, Document, MarkdownCell, Output};
pub use classify::{DEFAULT_LANGUAGE, LANGUAGES, MatchPolicy};
pub use execute::{ExecuteError, ExecuteOptions};
pub use formats::Format;
pub use ipynb::NotebookError;
pub use knit::{Knitr, KnitrError};
pub use reader::{MarkdownReader, ReadOptions};
pub use render::{MarkdownWriter, Template, WriteError, WriteOptions};
pub use segment::{Block, Grammar};
