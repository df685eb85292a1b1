//! BirdTag CLI - species tag normalization and tag search client.

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{fmt, EnvFilter};

mod client;
mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid arguments)
  65  Data error (malformed detections, rejected request, failed search)
  66  Input file missing or unreadable
  69  Server unavailable";

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON as returned by the server
    Json,
}

#[derive(Parser)]
#[command(name = "birdtag")]
#[command(author, version, about = "Bird species tagging and tag search", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// BirdTag server base URL
    #[arg(
        long,
        global = true,
        env = "BIRDTAG_SERVER",
        default_value = "http://localhost:3000"
    )]
    server: String,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug information to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn raw detector output into a species tag map
    Normalize {
        /// Raw detector JSON
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Media kind the detections came from
        #[arg(short, long, value_enum)]
        media: utils::MediaArg,

        /// Minimum detection confidence
        #[arg(short, long, default_value_t = birdtag_core::DEFAULT_CONFIDENCE)]
        confidence: f32,
    },

    /// Find your items carrying at least the given species counts
    Query {
        /// Owner of the items
        #[arg(short, long)]
        user: String,

        /// Species and minimum count, e.g. `crow=2` (a bare label means 1)
        #[arg(short, long = "tag", value_name = "LABEL[=COUNT]", required = true, value_parser = utils::parse_tag_arg)]
        tags: Vec<(String, u32)>,
    },

    /// Search your items by the species found in a probe file
    Search {
        /// Probe image, video or audio file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Owner of the searched items
        #[arg(short, long)]
        user: String,

        /// Wait for the search to finish
        #[arg(short, long)]
        wait: bool,

        /// Give up waiting after this many seconds
        #[arg(long, default_value_t = 120, requires = "wait")]
        timeout: u64,
    },

    /// Show the state of a search job
    Poll {
        /// Submitter of the job
        #[arg(short, long)]
        user: String,

        /// Job id returned by `search`
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "birdtag=debug,birdtag_core=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let output = utils::Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Normalize {
            file,
            media,
            confidence,
        } => commands::normalize::execute(file, media.into(), confidence, output),
        Commands::Query { user, tags } => {
            let client = client::ApiClient::new(&cli.server)?;
            commands::query::execute(&client, &user, tags, output).await
        }
        Commands::Search {
            file,
            user,
            wait,
            timeout,
        } => {
            let client = client::ApiClient::new(&cli.server)?;
            let wait = wait.then(|| Duration::from_secs(timeout));
            commands::search::execute(&client, file, &user, wait, output).await
        }
        Commands::Poll { user, job_id } => {
            let client = client::ApiClient::new(&cli.server)?;
            commands::search::poll(&client, &user, &job_id, output).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version come through here too
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    init_tracing(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        if let Some(message) = &exit.message {
            eprintln!("{} {}", "error:".red().bold(), message);
        }
        process::exit(exit.code);
    }
}
