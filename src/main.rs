mod cli;
mod config;
mod error;
mod export;
mod graph;
mod layout;
mod source;
mod tasks;
mod view;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Only warnings by default; RUST_LOG=info or debug for session detail
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let load_config = || Config::load_or_default(config_path);

    match cli.command {
        Commands::Init { force } => {
            cli::commands::init::run(config_path, force).await?;
        }
        Commands::Stats { source, top } => {
            cli::commands::stats::run(&load_config()?, source, top).await?;
        }
        Commands::Layout {
            source,
            layout,
            output,
        } => {
            cli::commands::layout::run(&load_config()?, source, layout, output).await?;
        }
        Commands::Render {
            source,
            layout,
            clicks,
            interaction,
            hover,
            pin,
            palette,
            size,
            format,
            output,
        } => {
            let replay = cli::commands::Replay {
                clicks,
                interaction,
            };
            cli::commands::render::run(
                &load_config()?,
                source,
                layout,
                replay,
                hover,
                pin,
                palette,
                size,
                format,
                output,
            )
            .await?;
        }
        Commands::Select {
            source,
            clicks,
            interaction,
            submit,
            flows,
            llm_assist,
            endpoint,
        } => {
            let replay = cli::commands::Replay {
                clicks,
                interaction,
            };
            cli::commands::select::run(&load_config()?, source, replay, submit, flows, llm_assist, endpoint).await?;
        }
    }

    Ok(())
}
