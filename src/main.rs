use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let rt = tokio::runtime::Runtime::new().context("creating tokio runtime")?;

    rt.block_on(async {
        match cli.command {
            cli::Command::CheckNode { config } => commands::check_node(&config).await,
            cli::Command::Balance { config, address } => {
                commands::balance(&config, address.as_deref()).await
            }
            cli::Command::Pay {
                config,
                payments,
                closure_time,
                dry_run,
            } => commands::pay(&config, &payments, closure_time, dry_run).await,
            cli::Command::Convert { config } => commands::convert(&config).await,
        }
    })
}
