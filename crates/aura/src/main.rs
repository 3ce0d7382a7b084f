//! aura - project-scoped knowledge retrieval and verified answers
//!
//! Thin command-line front end over `aura-sdk`.

use anyhow::{Context, Result};
use aura_sdk::{Aura, AuraConfig};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::Globals;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so JSON output stays clean
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("aura=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("aura {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = AuraConfig::load().context("Failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database_path = path;
    }
    tracing::debug!(database = %config.database_path.display(), user = %cli.user, "configuration loaded");
    let aura = Aura::new(config).context("Failed to initialize aura")?;

    let globals = Globals {
        aura: &aura,
        user: &cli.user,
        json: cli.json,
    };

    match cli.command {
        Commands::Search(args) => commands::search::search(args, &globals).await,
        Commands::Semantic(args) => commands::search::semantic(args, &globals).await,
        Commands::Context(args) => commands::context::execute(args, &globals).await,
        Commands::Snapshot(cmd) => commands::snapshot::execute(cmd, &globals).await,
        Commands::Knowledge(cmd) => commands::knowledge::execute(cmd, &globals).await,
        Commands::Project(cmd) => commands::project::execute(cmd, &globals).await,
        Commands::Conversation(cmd) => commands::conversation::execute(cmd, &globals).await,
        Commands::Verify(args) => commands::verify::execute(args, &globals).await,
        Commands::Version => Ok(()),
    }
}
