use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod command;

use cli::{Cli, Commands};
use command::{run_check, run_classify, run_validate, run_wait};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Check { json, connect }) => {
            run_check(json, connect).await?;
        }
        Some(Commands::Validate { service }) => {
            run_validate(service).await?;
        }
        Some(Commands::Classify { message }) => {
            run_classify(message).await?;
        }
        Some(Commands::Wait {
            url,
            cache_dir,
            fresh,
            timeout_secs,
        }) => {
            run_wait(url, cache_dir, fresh, timeout_secs).await?;
        }
        None => {
            // No command specified, show help
            eprintln!("No command specified. Use --help for usage information.");
            eprintln!("Use 'campus-health check' to run the startup checks.");
        }
    }

    Ok(())
}
