//! Kolosal Drift - Main Entry Point
//!
//! Runs drift detection and manages baselines and alerts from the shell.

use clap::Parser;
use kolosal_drift::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_drift=info".into()),
        )
        .init();

    let cli = Cli::parse();
    cli::run(cli).await
}
