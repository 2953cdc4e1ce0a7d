//! Driftwood CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! dw-cli migrate
//!
//! # Check which migrations have been applied
//! dw-cli migrate --dry-run
//!
//! # List the built-in demo catalog
//! dw-cli seed
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "dw-cli")]
#[command(author, version, about = "Driftwood CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate {
        /// List pending migrations without applying them
        #[arg(long)]
        dry_run: bool,
    },
    /// List the fixture catalog used when no catalog service is configured
    Seed,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Migrate { dry_run } => commands::migrate::run(dry_run).await,
        Commands::Seed => {
            commands::seed::run();
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}
