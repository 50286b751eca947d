//! Glance Command-Line Interface
//!
//! A headless front end to the capture session pipeline, for checking which
//! windows can be previewed and watching a preview session from a terminal.

mod colors;
mod commands;
mod exit_codes;

use clap::{Parser, Subcommand};
use exit_codes::ExitCode;

/// Glance - live window preview CLI
#[derive(Parser, Debug)]
#[command(name = "glance")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available capture sources
    List {
        #[command(subcommand)]
        source: ListSource,
    },
    /// Run a preview session for a window and report what it does
    Preview(PreviewOptions),
    /// Bring the application owning a window to the front
    Focus {
        /// Window ID (use 'glance list windows' to find)
        window_id: u32,
    },
    /// Show the config file location and effective settings
    Config,
    /// Show version information
    Version,
}

#[derive(Subcommand, Debug)]
enum ListSource {
    /// List capturable windows
    Windows,
}

#[derive(Parser, Debug, Clone)]
pub struct PreviewOptions {
    /// Window ID (use 'glance list windows' to find)
    window_id: u32,

    /// Frame rate to start with (defaults to the configured rate)
    #[arg(long)]
    fps: Option<f64>,

    /// Switch the running preview to this frame rate
    #[arg(long, requires = "after")]
    switch_fps: Option<f64>,

    /// Seconds to wait before switching frame rate
    #[arg(long, requires = "switch_fps")]
    after: Option<u64>,

    /// Auto-stop after duration (seconds)
    #[arg(short, long)]
    duration: Option<u64>,
}

/// Exit code for a command line clap refused to parse.
///
/// `--help` and `--version` come back from clap as errors too, but they are
/// successful runs.
fn parse_failure_code(error: &clap::Error) -> ExitCode {
    if error.use_stderr() {
        ExitCode::InvalidArguments
    } else {
        ExitCode::Success
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = parse_failure_code(&e);
            let _ = e.print();
            std::process::exit(code.as_i32());
        }
    };

    // Keep the file writer flushing until exit
    let log_guard = glance_core::logging::init_logging(cli.verbose);

    // Build the async runtime
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!(
                "{}",
                colors::error(&format!("Failed to create Tokio runtime: {}", e))
            );
            std::process::exit(ExitCode::GeneralError.as_i32());
        }
    };

    let exit_code = runtime.block_on(run(cli));
    drop(runtime);
    drop(log_guard);
    std::process::exit(exit_code.as_i32());
}

async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Commands::List { source } => match source {
            ListSource::Windows => commands::list_windows(cli.json, cli.quiet).await,
        },
        Commands::Preview(options) => commands::preview(options, cli.json, cli.quiet).await,
        Commands::Focus { window_id } => commands::focus(window_id, cli.json, cli.quiet).await,
        Commands::Config => commands::config(cli.json),
        Commands::Version => {
            commands::version(cli.json);
            ExitCode::Success
        }
    }
}
