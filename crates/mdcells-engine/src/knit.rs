//! Weaving preprocessor: converts R-markdown (or anything knitr supports)
//! into plain markdown by invoking `Rscript` as a blocking subprocess.
//!
//! Setup problems (no R on the path, knitr not installed) are reported
//! distinctly from conversion problems so callers can tell the user to fix
//! their environment rather than their document.

use std::fs;
use std::process::Command;

use tracing::debug;

const PROBE_COMMAND: &str = "Rscript -e 'require(knitr)'";
const DEFAULT_OPTS_KNIT: &str = "progress=FALSE, verbose=FALSE";

/// Default chunk options: convert without evaluating chunks.
pub const DEFAULT_OPTS_CHUNK: &str = "eval=FALSE";

#[derive(Debug, thiserror::Error)]
pub enum KnitrError {
    #[error("Rscript was not found on your path")]
    RscriptMissing(#[source] std::io::Error),
    #[error("could not load knitr (needs manual installation)\n\n$ {command}\n{stderr}")]
    KnitrUnavailable { command: String, stderr: String },
    #[error("knitr failed\n\n$ {command}\n{stderr}")]
    Failed { command: String, stderr: String },
    #[error("i/o error while weaving: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to a working knitr installation.
#[derive(Debug)]
pub struct Knitr;

impl Knitr {
    /// Probe for `Rscript` and an importable knitr library. Fails with a
    /// distinguishable error for each missing piece.
    pub fn new() -> Result<Self, KnitrError> {
        let output = Command::new("Rscript")
            .args(["-e", "require(knitr)"])
            .output()
            .map_err(KnitrError::RscriptMissing)?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if stderr.contains("Warning") {
            return Err(KnitrError::KnitrUnavailable {
                command: PROBE_COMMAND.to_string(),
                stderr,
            });
        }
        Ok(Knitr)
    }

    /// Convert the input text to markdown, returning the woven result.
    ///
    /// `opts_chunk` is passed verbatim to knitr's `opts_chunk$set`.
    pub fn knit(&self, input: &str, opts_chunk: &str) -> Result<String, KnitrError> {
        let dir = tempfile::tempdir()?;
        let in_path = dir.path().join("input.Rmd");
        let out_path = dir.path().join("output.md");
        fs::write(&in_path, input)?;

        let script = format!(
            "sink(\"/dev/null\");library(knitr);opts_knit$set({});opts_chunk$set({});knit(\"{}\", output=\"{}\")",
            DEFAULT_OPTS_KNIT,
            opts_chunk,
            in_path.display(),
            out_path.display(),
        );
        debug!(%script, "weaving with knitr");

        let output = Command::new("Rscript")
            .arg("-e")
            .arg(&script)
            .output()
            .map_err(KnitrError::RscriptMissing)?;

        if !output.status.success() {
            return Err(KnitrError::Failed {
                command: format!("Rscript -e '{script}'"),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(fs::read_to_string(&out_path)?)
    }
}
