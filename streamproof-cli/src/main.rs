//! Streamproof CLI - C2PA validation for fragmented MP4 streams.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success (or the stream carries no content credentials)
  1   General error
  65  Validation failed (track failed or a chunk is invalid)
  66  Cannot open input file
  74  I/O error";

#[derive(Parser)]
#[command(name = "streamproof")]
#[command(
    author,
    version,
    about = "C2PA content credential validation for fragmented MP4 streams",
    long_about = None
)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Enable debug logging of the validation pipeline
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an init segment and its media chunks
    Validate(ValidateArgs),

    /// Print the manifests of an init segment or a raw manifest store
    Inspect {
        /// Init segment (.mp4, .m4s) or manifest store (.jumbf, .c2pa)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print a JSON document instead of text
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Init segment carrying the manifest
    #[arg(long, value_name = "INIT")]
    pub init: PathBuf,

    /// Track the segments belong to
    #[arg(long, default_value = "video")]
    pub track: String,

    /// Duration of each chunk, in seconds
    #[arg(long, value_name = "SECS", default_value_t = 2.0)]
    pub chunk_duration: f64,

    /// Print one JSON event per line instead of text
    #[arg(long)]
    pub json: bool,

    /// Media chunks, in presentation order
    #[arg(value_name = "CHUNK")]
    pub chunks: Vec<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "streamproof_core=debug,streamproof=debug"
    } else {
        "streamproof_core=info,streamproof=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Inspect { file, json } => commands::inspect::execute(file, json),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match run(cli).await {
        Ok(exit) => exit,
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
