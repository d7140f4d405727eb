use clap::{Parser, Subcommand};

/// Campus Health - startup health checks and graceful degradation
#[derive(Parser)]
#[command(name = "campus-health")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the boot sequence against the current environment
    Check {
        /// Print the runtime state and report as JSON
        #[arg(long)]
        json: bool,

        /// Also open a TCP connection to each configured service
        #[arg(long)]
        connect: bool,
    },
    /// Validate the configuration of one service
    Validate {
        /// Service name (database, cache, storage, auth)
        service: String,
    },
    /// Classify an error message
    Classify {
        /// Error message to classify
        message: String,
    },
    /// Wait for a server to pass its startup health checks
    Wait {
        /// Base URL of the server
        #[arg(long, env = "CAMPUS_HEALTH_URL", default_value = "http://localhost:3000")]
        url: String,

        /// Directory holding the session flag. Defaults to ~/.campus
        #[arg(long, env = "CAMPUS_CACHE_DIR")]
        cache_dir: Option<String>,

        /// Ignore a previously completed session and check again
        #[arg(long)]
        fresh: bool,

        /// Override the overall wait budget
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}
