//! Maitred CLI, the main entry point.
//!
//! Commands:
//! - `serve`    Start the HTTP API server
//! - `doctor`   Check configuration, database and completion provider
//! - `context`  Print the context prompt built from current data
//! - `status`   Show the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "maitred",
    about = "Maitred: restaurant AI assistant backend",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Diagnose configuration, database and provider connectivity
    Doctor,

    /// Print the context prompt built from the current database rows
    Context {
        /// Use the one-shot prompt instead of the conversational one
        #[arg(long)]
        one_shot: bool,
    },

    /// Show the effective configuration (secrets redacted)
    Status {
        /// Print a sample maitred.toml instead
        #[arg(long)]
        sample: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Context { one_shot } => commands::context::run(one_shot).await?,
        Commands::Status { sample } => commands::status::run(sample)?,
    }

    Ok(())
}
