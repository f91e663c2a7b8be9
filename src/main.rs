//! Binary entry point for refcontext.
//!
//! Runs the reference detector, resolver, and state extractor over JSON
//! files so their behavior can be inspected outside a chat backend.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use refcontext::config::EngineConfig;
use refcontext::llm::build_llm_provider;
use refcontext::observability::{self, LogFormat, LoggingConfig};
use refcontext::service::TurnContext;
use refcontext::{
    ChatMessage, ConversationState, StateExtractor, detect_references, get_primary_reference,
    get_required_layers,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// refcontext - conversational reference resolution for a health assistant.
#[derive(Parser)]
#[command(name = "refcontext")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Detect references in a message.
    Detect {
        /// The user message.
        message: String,
    },

    /// Resolve references in a message against a stored state.
    Resolve {
        /// The user message.
        message: String,

        /// Conversation state JSON file (empty state when omitted).
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Print only the guidance block.
        #[arg(long)]
        guidance_only: bool,
    },

    /// Fold a message history into a conversation state.
    Extract {
        /// Message history JSON file (array of messages).
        #[arg(long)]
        history: PathBuf,

        /// Previous conversation state JSON file.
        #[arg(short, long)]
        state: Option<PathBuf>,

        /// Use pattern extraction only.
        #[arg(long)]
        no_llm: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DetectOutput {
    references: Vec<refcontext::DetectedReference>,
    primary: refcontext::DetectedReference,
    required_layers: std::collections::BTreeSet<refcontext::StateLayer>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let mut logging = LoggingConfig::from_settings(&config.logging, cli.verbose);
    if let Some(format) = cli.log_format {
        logging = logging.with_format(format.into());
    }
    if let Err(e) = observability::init_logging(&logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("reading {}", path.display())),
        None => Ok(EngineConfig::load_default()),
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: EngineConfig) -> Result<()> {
    match command {
        Commands::Detect { message } => cmd_detect(&message),
        Commands::Resolve {
            message,
            state,
            guidance_only,
        } => cmd_resolve(&message, state.as_deref(), guidance_only),
        Commands::Extract {
            history,
            state,
            no_llm,
        } => cmd_extract(&history, state.as_deref(), no_llm, config),
    }
}

fn cmd_detect(message: &str) -> Result<()> {
    let references = detect_references(message);
    let output = DetectOutput {
        primary: get_primary_reference(&references),
        required_layers: get_required_layers(&references),
        references,
    };
    print_json(&output)
}

fn cmd_resolve(message: &str, state_path: Option<&Path>, guidance_only: bool) -> Result<()> {
    let state = match state_path {
        Some(path) => read_json::<ConversationState>(path)?,
        None => ConversationState::default(),
    };
    let context = TurnContext::build(message, &state);
    if guidance_only {
        println!("{}", context.guidance);
        return Ok(());
    }
    print_json(&context)
}

fn cmd_extract(
    history_path: &Path,
    state_path: Option<&Path>,
    no_llm: bool,
    config: EngineConfig,
) -> Result<()> {
    let history: Vec<ChatMessage> = read_json(history_path)?;
    let previous = state_path
        .map(read_json::<ConversationState>)
        .transpose()?;

    let config = if no_llm { config.without_llm() } else { config };
    let provider = if config.extraction.use_llm {
        build_llm_provider(&config.llm)
    } else {
        None
    };
    let extractor = StateExtractor::new(provider, &config);
    if !extractor.uses_llm() {
        tracing::info!("Running pattern extraction only");
    }

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let outcome = runtime.block_on(extractor.extract(&history, previous.as_ref()));

    print_json(&outcome)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("encoding output")?;
    println!("{json}");
    Ok(())
}
