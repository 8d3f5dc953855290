use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};

use mdcells_config::Config;
use mdcells_engine::execute::{self, ExecuteOptions};
use mdcells_engine::formats::{self, Format};
use mdcells_engine::ipynb;
use mdcells_engine::knit::Knitr;
use mdcells_engine::reader::{MarkdownReader, ReadOptions};
use mdcells_engine::render::{MarkdownWriter, Template, WriteOptions};
use mdcells_engine::segment::Grammar;
use mdcells_engine::MatchPolicy;

const EXAMPLES: &str = "\
Example usage of mdcells
------------------------

Convert markdown into a notebook:

    mdcells input.md > output.ipynb

    mdcells input.md --output output.ipynb


Convert a notebook into markdown, with outputs intact:

    mdcells input.ipynb --from notebook --to markdown > output_with_outputs.md


Convert a notebook into markdown, stripping all outputs:

    mdcells input.ipynb --from notebook --to markdown --strip > output.md


Strip the output cells from markdown:

    mdcells with_output_cells.md --to markdown --strip > no_output_cells.md


Convert from markdown and execute:

    mdcells input.md --run > executed_notebook.ipynb


Convert r-markdown into markdown:

    mdcells input.Rmd --to markdown --knit > output.md


Convert r-markdown into a notebook:

    mdcells input.Rmd --knit > output.ipynb


Convert r-markdown into a notebook with the outputs computed, using
the rmagic extension to execute the code blocks:

    mdcells input.Rmd --knit --rmagic --run > executed_output.ipynb
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum FormatArg {
    Markdown,
    Notebook,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => Format::Markdown,
            FormatArg::Notebook => Format::Notebook,
        }
    }
}

/// Create a notebook from markdown.
#[derive(Parser)]
#[command(
    name = "mdcells",
    version,
    about = "Create a notebook from markdown",
    after_help = "Example:  mdcells some_markdown.md > new_notebook.ipynb"
)]
struct Cli {
    /// Markdown input file (default STDIN)
    input_file: Option<String>,

    /// Output file (default STDOUT). If the flag is used with no file,
    /// the output name is derived from the input file. This will
    /// OVERWRITE if input and output formats are the same.
    #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
    output: Option<String>,

    /// Format to convert from; defaults to the file extension, then markdown
    #[arg(long = "from", value_name = "FORMAT", value_enum)]
    informat: Option<FormatArg>,

    /// Format to convert to; defaults to the file extension, then notebook.
    /// Setting --render forces this to markdown
    #[arg(long = "to", value_name = "FORMAT", value_enum)]
    outformat: Option<FormatArg>,

    /// Run the notebook, executing the contents of each cell
    #[arg(long, alias = "execute")]
    run: bool,

    /// Kernel to use to run the notebook
    #[arg(long)]
    kernel: Option<String>,

    /// Cell execution timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Strip output cells
    #[arg(long = "strip")]
    strip_outputs: bool,

    /// Additional code to place at the start of the notebook,
    /// e.g. --precode '%matplotlib inline' 'import numpy as np'
    #[arg(long, num_args = 1..)]
    precode: Vec<String>,

    /// Pre-process the markdown with knitr. Default chunk options are
    /// 'eval=FALSE'; change them with --knit=OPTS. Requires R on your
    /// path with knitr installed
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "eval=FALSE", value_name = "OPTS")]
    knit: Option<String>,

    /// Autoload the rmagic extension. Synonym for
    /// --precode '%load_ext rpy2.ipython'
    #[arg(long)]
    rmagic: bool,

    /// Disable code magic
    #[arg(long = "nomagic", action = clap::ArgAction::SetFalse)]
    magic: bool,

    /// Render outputs, forcing markdown output
    #[arg(long)]
    render: bool,

    /// Extract binary output payloads to files in the output directory
    #[arg(long)]
    write_resources: bool,

    /// Determine which code blocks become code cells: 'all' (default),
    /// 'fenced', 'strict', or a specific language to match on
    #[arg(long = "match", value_name = "POLICY")]
    match_policy: Option<String>,

    /// Show example usage
    #[arg(long)]
    examples: bool,

    /// Show logging output
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.debug {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
            .with_writer(io::stderr)
            .init();
    }

    if cli.examples {
        print!("{EXAMPLES}");
        return Ok(());
    }

    let input_path = cli.input_file.as_deref().filter(|p| *p != "-");

    // No input file and nothing piped in: show help instead of hanging.
    if input_path.is_none() && io::stdin().is_terminal() {
        Cli::command().print_help()?;
        return Ok(());
    }

    let mut input_text = match input_path {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("cannot read '{path}'"))?
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            buf
        }
    };

    if let Some(chunk_options) = &cli.knit {
        let knitr = Knitr::new().context("knitr is not usable")?;
        input_text = knitr
            .knit(&input_text, chunk_options)
            .context("weaving input with knitr failed")?;
    }

    let config = Config::load()
        .context("invalid mdcells config file")?
        .unwrap_or_default();

    let mut precode = cli.precode.clone();
    if cli.rmagic {
        precode.push("%load_ext rpy2.ipython".to_string());
    }

    let output_path = cli.output.as_deref().filter(|p| *p != "-");

    let informat: Format = cli
        .informat
        .map(Format::from)
        .or_else(|| input_path.and_then(|p| formats::detect(Path::new(p))))
        .unwrap_or(Format::Markdown);

    let outformat: Format = if cli.render {
        Format::Markdown
    } else {
        cli.outformat
            .map(Format::from)
            .or_else(|| {
                output_path
                    .filter(|p| !p.is_empty())
                    .and_then(|p| formats::detect(Path::new(p)))
            })
            .unwrap_or(Format::Notebook)
    };

    let match_policy = MatchPolicy::from_word(
        &cli.match_policy
            .or(config.match_policy)
            .unwrap_or_else(|| "all".to_string()),
    );

    let mut document = match informat {
        Format::Markdown => {
            let reader = MarkdownReader::new(ReadOptions {
                grammar: Grammar::Both,
                precode: precode.join("\n"),
                magic: cli.magic,
                match_policy,
                extract_captions: cli.render,
            });
            reader
                .read(&input_text)
                .context("cannot convert markdown to a notebook")?
        }
        Format::Notebook => {
            ipynb::read_str(&input_text).context("cannot read notebook input")?
        }
    };

    if cli.run {
        execute::run(
            &mut document,
            &ExecuteOptions {
                timeout_secs: cli.timeout,
                kernel: cli.kernel.clone(),
            },
        )
        .context("notebook execution failed")?;
    }

    let strip_outputs = cli.strip_outputs || config.strip_outputs;
    if strip_outputs {
        document.strip_outputs();
    }

    let output_text = match outformat {
        Format::Markdown => {
            let template = if cli.render {
                Template::MarkdownOutputs
            } else {
                Template::Markdown
            };
            let writer = MarkdownWriter::new(
                template,
                WriteOptions {
                    strip_outputs,
                    write_resources: cli.write_resources,
                    output_dir: config
                        .output_dir
                        .clone()
                        .unwrap_or_else(|| PathBuf::from("figures")),
                },
            );
            writer
                .write(&document)
                .context("cannot render notebook as markdown")?
        }
        Format::Notebook => {
            ipynb::write_str(&document).context("cannot serialize notebook")?
        }
    };

    write_result(&output_text, &cli.output, input_path, outformat)
}

fn write_result(
    output_text: &str,
    output: &Option<String>,
    input_path: Option<&str>,
    outformat: Format,
) -> Result<()> {
    match output.as_deref() {
        // No -o flag, or an explicit '-': stdout.
        None | Some("-") => {
            io::stdout()
                .write_all(output_text.as_bytes())
                .context("cannot write stdout")?;
        }
        // Bare -o: derive the output name from the input file.
        Some("") => {
            let Some(input) = input_path else {
                bail!("cannot overwrite with no input file given");
            };
            let extension = match outformat {
                Format::Markdown => "md",
                Format::Notebook => "ipynb",
            };
            let path = Path::new(input).with_extension(extension);
            fs::write(&path, output_text)
                .with_context(|| format!("cannot write '{}'", path.display()))?;
        }
        Some(path) => {
            fs::write(path, output_text).with_context(|| format!("cannot write '{path}'"))?;
        }
    }
    Ok(())
}
