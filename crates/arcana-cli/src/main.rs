//! Arcana CLI
//!
//! Command-line interface for the Arcana backend connection: inspect
//! the connection, run a workspace sync, and watch inbound messages.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "arcana")]
#[command(about = "Arcana - workspace sync client for the Arcana backend")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to an alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show connection status
    Status,
    /// Select a GitHub repository and wait for the workspace sync
    Select {
        /// Numeric GitHub repository id
        #[arg(long)]
        repo_id: i64,
        /// Repository name
        #[arg(long)]
        name: String,
        /// Repository owner
        #[arg(long)]
        owner: String,
        /// Repository clone URL
        #[arg(long)]
        url: String,
        /// Branch to sync (server picks the default branch when omitted)
        #[arg(long)]
        branch: Option<String>,
        /// GitHub access token (falls back to config or ARCANA_ACCESS_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },
    /// Print inbound frames of one message type
    Listen {
        /// Message type tag to subscribe to
        message_type: String,
        /// Stop after this many frames (default: run until Ctrl-C)
        #[arg(short, long)]
        count: Option<usize>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (endpoint_url, access_token)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match cli.command {
        Commands::Status => commands::status::show(cli.config.as_ref(), &output).await,
        Commands::Select {
            repo_id,
            name,
            owner,
            url,
            branch,
            token,
        } => {
            let args = commands::select::SelectArgs {
                repo_id,
                name,
                owner,
                url,
                branch,
                token,
            };
            commands::select::run(args, cli.config.as_ref(), &output).await
        }
        Commands::Listen {
            message_type,
            count,
        } => commands::listen::run(&message_type, count, cli.config.as_ref(), &output).await,
        Commands::Config { command } => match command {
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, cli.config.as_ref(), &output)
            }
            Some(ConfigCommands::Show) | None => {
                commands::config::show(cli.config.as_ref(), &output)
            }
        },
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("arcana_core=warn,arcana_cli=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
