//! Run-cells collaborator: executes a document's code cells through an
//! external Jupyter `nbconvert` subprocess and reads the outputs back.

use std::fs;
use std::process::Command;

use tracing::debug;

use crate::cells::Document;
use crate::ipynb::{self, NotebookError};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Per-cell execution timeout in seconds.
    pub timeout_secs: u64,
    /// Kernel name to run with, when not the server default.
    pub kernel: Option<String>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        ExecuteOptions {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            kernel: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("jupyter-nbconvert was not found on your path")]
    NbconvertMissing(#[source] std::io::Error),
    #[error("cell execution timed out after {timeout}s\n{stderr}")]
    Timeout { timeout: u64, stderr: String },
    #[error("notebook execution failed\n\n$ {command}\n{stderr}")]
    Failed { command: String, stderr: String },
    #[error("executed notebook could not be read back: {0}")]
    Notebook(#[from] NotebookError),
    #[error("i/o error while executing notebook: {0}")]
    Io(#[from] std::io::Error),
}

/// Execute every code cell, populating outputs and execution counts in
/// place. A per-cell timeout surfaces as [`ExecuteError::Timeout`].
pub fn run(document: &mut Document, options: &ExecuteOptions) -> Result<(), ExecuteError> {
    let dir = tempfile::tempdir()?;
    let in_path = dir.path().join("notebook.ipynb");
    fs::write(&in_path, ipynb::write_str(document)?)?;

    let mut command = Command::new("jupyter-nbconvert");
    command
        .args(["--to", "notebook", "--execute", "--output", "executed.ipynb"])
        .arg("--output-dir")
        .arg(dir.path())
        .arg(format!(
            "--ExecutePreprocessor.timeout={}",
            options.timeout_secs
        ));
    if let Some(kernel) = &options.kernel {
        command.arg(format!("--ExecutePreprocessor.kernel_name={kernel}"));
    }
    command.arg(&in_path);
    debug!(?command, "executing notebook");

    let output = command.output().map_err(ExecuteError::NbconvertMissing)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if stderr.contains("CellTimeoutError") || stderr.contains("Timeout waiting") {
            return Err(ExecuteError::Timeout {
                timeout: options.timeout_secs,
                stderr,
            });
        }
        return Err(ExecuteError::Failed {
            command: format!("{command:?}"),
            stderr,
        });
    }

    let executed = ipynb::read_str(&fs::read_to_string(dir.path().join("executed.ipynb"))?)?;
    document.cells = executed.cells;
    document.metadata = executed.metadata;
    Ok(())
}
