mod cli;
mod commands;
mod config;
mod workflow_manifest;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, WorkflowCommand};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => commands::serve::run(config.as_deref()).await,
        Commands::Status { config } => commands::status::run(config.as_deref()).await,
        Commands::Queue { config } => commands::queue::run(config.as_deref()).await,
        Commands::Workflow { command } => match command {
            WorkflowCommand::List { manifest } => commands::workflow::list(manifest.as_deref()),
            WorkflowCommand::Describe { name, manifest } => commands::workflow::describe(&name, manifest.as_deref()),
        },
        Commands::Completion { shell } => {
            let mut command = Cli::command();
            let name = command.get_name().to_string();
            clap_complete::generate(shell, &mut command, name, &mut std::io::stdout());
            Ok(())
        }
    }
}
