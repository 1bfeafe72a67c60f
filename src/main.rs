use anyhow::Context;
use clap::Parser;
use clap::builder::BoolishValueParser;
use colored::Colorize;
use editor_agent::backend::ModelInfo;
use editor_agent::{BackendKind, Config, OutputFormat, Pipeline, RetryPolicy, RunMode};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "editor-agent",
    version,
    author,
    about = "Edit manuscripts against a style guide and per-file review notes",
    long_about = "Edit manuscripts against a shared style guide and per-document review notes \
    using a remote (Anthropic) or local (Ollama) language model.\n\n\
    Each document in the source directory is paired with the review note that has the \
    same filename stem. Edited copies are written to the output directory as \
    <name>-<model>.<ext>; existing artifacts are never overwritten.\n\n\
    USAGE EXAMPLES:\n  \
      # Edit every document that has review notes\n  \
      editor-agent --batch\n\n  \
      # Edit one file with inline notes using Claude\n  \
      editor-agent essay.txt --backend anthropic --review-text \"Tighten the intro\"\n\n  \
      # Long manuscript, split into 2000-word chunks, written as .docx\n  \
      editor-agent --batch --chunk-size 2000 --output-format docx\n\n  \
      # Show installed Ollama models\n  \
      editor-agent --list-models\n\n  \
      # Diff every edited version of essay.txt\n  \
      editor-agent --compare essay"
)]
struct Cli {
    /// Documents to edit (looked up in the source directory if not found)
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Edit every document in the source directory that has review notes
    #[arg(short, long, conflicts_with = "files")]
    batch: bool,

    /// Backend to send edits to
    #[arg(long, value_enum, default_value = "ollama")]
    backend: CliBackend,

    /// Model identifier (defaults depend on the backend)
    #[arg(short, long)]
    model: Option<String>,

    /// List available models and exit
    #[arg(short, long)]
    list_models: bool,

    /// Diff the edited versions of a document (all documents if no name)
    #[arg(
        long,
        value_name = "NAME",
        num_args = 0..=1,
        conflicts_with_all = ["files", "batch", "list_models"]
    )]
    compare: Option<Option<String>>,

    /// Review notes file to use instead of the stem match
    #[arg(long, value_name = "FILE", conflicts_with = "review_text")]
    review: Option<PathBuf>,

    /// Inline review notes to use instead of the stem match
    #[arg(long, value_name = "TEXT")]
    review_text: Option<String>,

    /// Max words per chunk (whole document if omitted)
    #[arg(long, value_name = "WORDS", allow_negative_numbers = true)]
    chunk_size: Option<i64>,

    /// Output document format
    #[arg(long, value_enum, default_value = "same")]
    output_format: CliOutputFormat,

    /// Directory containing documents to edit
    #[arg(long, default_value = "original-texts", value_name = "PATH")]
    source_dir: PathBuf,

    /// Directory containing review notes
    #[arg(long, default_value = "review-notes", value_name = "PATH")]
    notes_dir: PathBuf,

    /// Directory for edited documents
    #[arg(short, long, default_value = "edited-texts", value_name = "PATH")]
    output_dir: PathBuf,

    /// Style guide applied to every document
    #[arg(long, default_value = "INSTRUCTIONS.md", value_name = "FILE")]
    instructions: PathBuf,

    /// Ollama server address
    #[arg(long, env = "OLLAMA_HOST", default_value = "http://localhost:11434")]
    ollama_url: String,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Attempts per backend call, including the first
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Minimum edited/original word ratio before a result counts as a summary
    #[arg(long, default_value_t = 0.5)]
    min_word_ratio: f64,

    /// Do not retry suspected summaries with a correction prompt
    #[arg(long)]
    no_regenerate: bool,

    /// Fail a document whose edit still looks like a summary
    #[arg(long)]
    strict: bool,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 300, value_name = "SECONDS")]
    timeout: u64,

    /// Sampling temperature (backend default if omitted)
    #[arg(long)]
    temperature: Option<f32>,

    /// Dry run (don't call the backend or write files)
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Colored output
    #[arg(
        long,
        env = "DEBUG_COLORS",
        action = clap::ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        default_value_t = true,
        hide = true
    )]
    colors: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliBackend {
    /// Anthropic Messages API
    #[value(alias = "claude", alias = "remote")]
    Anthropic,
    /// Local Ollama server
    #[value(alias = "local")]
    Ollama,
}

impl From<CliBackend> for BackendKind {
    fn from(b: CliBackend) -> Self {
        match b {
            CliBackend::Anthropic => Self::Remote,
            CliBackend::Ollama => Self::Local,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Txt,
    Docx,
    Same,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(f: CliOutputFormat) -> Self {
        match f {
            CliOutputFormat::Txt => Self::Txt,
            CliOutputFormat::Docx => Self::Docx,
            CliOutputFormat::Same => Self::Same,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    colored::control::set_override(cli.colors);
    setup_tracing(cli.verbose, cli.colors);

    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", "Error:".red().bold(), err);
            let is_config = err
                .downcast_ref::<editor_agent::Error>()
                .is_some_and(editor_agent::Error::is_config);
            if is_config { ExitCode::from(2) } else { ExitCode::FAILURE }
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let mode = if cli.list_models {
        RunMode::ListModels
    } else if let Some(stem) = cli.compare {
        RunMode::Compare(stem)
    } else if cli.batch {
        RunMode::Batch
    } else {
        RunMode::Files(cli.files)
    };

    let mut builder = Config::builder()
        .mode(mode)
        .backend(cli.backend.into())
        .source_dir(cli.source_dir)
        .notes_dir(cli.notes_dir)
        .output_dir(cli.output_dir)
        .style_guide(cli.instructions)
        .output_format(cli.output_format.into())
        .ollama_url(normalize_host(&cli.ollama_url))
        .request_timeout(Duration::from_secs(cli.timeout))
        .retry(RetryPolicy {
            max_attempts: cli.max_attempts,
            ..RetryPolicy::default()
        })
        .min_word_ratio(cli.min_word_ratio)
        .regenerate_on_summary(!cli.no_regenerate)
        .strict(cli.strict)
        .dry_run(cli.dry_run);

    if let Some(model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(path) = cli.review {
        builder = builder.review_file(path);
    }
    if let Some(text) = cli.review_text {
        builder = builder.review_text(text);
    }
    if let Some(words) = cli.chunk_size {
        builder = builder.chunk_size(words);
    }
    if let Some(temperature) = cli.temperature {
        builder = builder.temperature(temperature);
    }

    let config = builder.build().context("Invalid configuration")?;

    if config.mode == RunMode::ListModels {
        let models = editor_agent::list_models(&config).context("Failed to list models")?;
        print_models(config.backend, &models);
        return Ok(ExitCode::SUCCESS);
    }

    if matches!(config.mode, RunMode::Compare(_)) {
        let comparisons = editor_agent::compare(&config).context("Failed to compare outputs")?;
        for comparison in &comparisons {
            comparison.print();
        }
        return Ok(ExitCode::SUCCESS);
    }

    let report = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Editing run failed")?;

    report.print_summary();

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn print_models(backend: BackendKind, models: &[ModelInfo]) {
    println!("\n{} models ({}):", backend.name().bold(), models.len());

    if models.is_empty() {
        println!("  No models installed. Suggested models:");
        for (name, description) in editor_agent::local_models() {
            println!("  {:<24} {}", name.cyan(), description);
            println!("  {:<24} ollama pull {}", "", name);
        }
        return;
    }

    for model in models {
        let size = model
            .size_gb()
            .map(|gb| format!("{gb:>6.1} GB"))
            .unwrap_or_default();
        println!(
            "  {:<36} {:>9}  {}",
            model.id.cyan(),
            size,
            model.description.as_deref().unwrap_or("").dimmed()
        );
    }
    println!();
}

/// Accepts `OLLAMA_HOST` values without a scheme, as the Ollama CLI does.
fn normalize_host(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

fn setup_tracing(verbosity: u8, colors: bool) {
    let filter = match verbosity {
        0 => EnvFilter::new("editor_agent=info"),
        1 => EnvFilter::new("editor_agent=debug"),
        _ => EnvFilter::new("editor_agent=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(colors),
        )
        .init();
}
