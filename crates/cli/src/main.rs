//! webpilot CLI - the main entry point.
//!
//! Commands:
//! - `actions`  - Print the merged action space as JSON
//! - `validate` - Load and validate the configuration
//! - `replay`   - Run a scripted decision file against the in-memory driver

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod stack;

#[derive(Parser)]
#[command(
    name = "webpilot",
    about = "webpilot - a language-model agent for browsers and desktops",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to ~/.webpilot/config.toml)
    #[arg(short, long, global = true, env = "WEBPILOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged action space as JSON
    Actions,

    /// Load and validate the configuration
    Validate,

    /// Replay a decision script against the in-memory driver
    Replay {
        /// JSON array of decisions (`[{"thought": .., "action": {..}}, ..]`)
        script: PathBuf,

        /// Task description handed to the agent
        #[arg(short, long, default_value = "Replay")]
        task: String,

        /// Extra browser tab, as `Title=URL` (repeatable)
        #[arg(long = "tab", value_name = "TITLE=URL")]
        tabs: Vec<String>,

        /// Test data for the task, as `KEY=VALUE` (repeatable)
        #[arg(long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Write the agent's memory to this file afterwards
        #[arg(long, value_name = "PATH")]
        memory_out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let logs = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        logs.json().init();
    } else {
        logs.init();
    }

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Actions => commands::actions::run(config).await?,
        Commands::Validate => commands::validate::run(config).await?,
        Commands::Replay {
            script,
            task,
            tabs,
            data,
            memory_out,
        } => {
            let inputs = commands::replay::Inputs {
                task: &task,
                tabs: &tabs,
                data: &data,
            };
            commands::replay::run(config, &script, inputs, memory_out.as_deref()).await?
        }
    }

    Ok(())
}
