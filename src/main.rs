//! Kolosal Federated - Main Entry Point

use clap::Parser;
use kolosal_federated::cli::{cmd_info, cmd_serve, cmd_simulate, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_federated=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { data } => {
            tokio::task::spawn_blocking(move || cmd_simulate(&data)).await??;
        }
        Commands::Train { hospital, data } => {
            tokio::task::spawn_blocking(move || cmd_train(hospital, &data)).await??;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
        Commands::Serve { port, host, data } => {
            cmd_serve(host, port, &data).await?;
        }
    }

    Ok(())
}
