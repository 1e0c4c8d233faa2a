mod config;
mod launcher;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::LauncherConfig;
use crate::launcher::LaunchError;

#[derive(Parser, Debug)]
#[command(name = "litflix", about = "Start or build the Litflix backend and frontend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the backend and the frontend dev server together (ports 8000 / 5173 by default).
    Dev,
    /// Build the frontend for production.
    Build,
}

#[tokio::main]
async fn main() -> Result<(), LaunchError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = LauncherConfig::from_env();

    match cli.command {
        Command::Dev => launcher::run_dev(&config).await,
        Command::Build => launcher::run_build(&config).await,
    }
}
