//! GitFerry CLI - migrate users, groups, projects, and repositories
//! between two GitLab instances.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

/// GitFerry - GitLab instance-to-instance migration
#[derive(Parser, Debug)]
#[command(name = "gitferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, default_value = "gitferry.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the migration
    Migrate {
        /// Preview without writing anything to the destination
        #[arg(long)]
        dry_run: bool,
    },

    /// Check configuration and connectivity to both instances
    Validate,

    /// Write a configuration template
    InitConfig {
        /// Output path for the template
        #[arg(default_value = "gitferry.yml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("gitferry={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Migrate { dry_run } => commands::migrate(&cli.config, dry_run).await,
        Commands::Validate => commands::validate(&cli.config).await,
        Commands::InitConfig { path } => commands::init_config(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
