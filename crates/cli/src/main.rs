//! ankigen CLI, the main entry point.
//!
//! Commands:
//! - `generate` : research a question and print a flashcard
//! - `init`     : write a default config file
//! - `config`   : show the effective configuration
//! - `doctor`   : check that the configured services answer

use clap::{Parser, Subcommand};

mod commands;
mod stdin_channel;

#[derive(Parser)]
#[command(
    name = "ankigen",
    about = "Research a question on the web and turn it into a flashcard",
    version,
    author
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
    /// Generate a card for a question
    Generate(commands::generate::GenerateArgs),

    /// Write a default config file to ~/.ankigen/config.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration (secrets redacted)
    Config {
        /// Print only the config file path
        #[arg(long)]
        path: bool,
    },

    /// Check the model, search and embedding services
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the card.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate(args) => commands::generate::run(args).await?,
        Commands::Init { force } => commands::init::run(force).await?,
        Commands::Config { path } => {
            if path {
                commands::config_cmd::path().await?
            } else {
                commands::config_cmd::show().await?
            }
        }
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
