//! ecr-release - container image release step
//!
//! CLI entry point that sets up logging and dispatches to a command.

use clap::Parser;
use console::style;
use ecr_release::cli::{commands, Cli, Commands, LogFormat};
use ecr_release::error::ReleaseResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ReleaseResult<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("ecr_release=warn"),
        1 => EnvFilter::new("ecr_release=info"),
        _ => EnvFilter::new("ecr_release=debug"),
    };

    // stdout is reserved for machine-readable output
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    match cli.log_format {
        LogFormat::Text => subscriber.without_time().init(),
        LogFormat::Json => subscriber.json().init(),
    }

    match cli.command {
        Some(Commands::Requirements) => commands::requirements(),
        None => commands::release(cli.release).await,
    }
}
