//! Select command handler
//!
//! Runs one GitHub workspace selection end to end, streaming progress
//! lines while the backend clones and indexes the repository.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::time::timeout;

use arcana_core::{ArcanaClient, Config, ConnectionState, RepoData, SyncStatus};

use crate::output::{Output, OutputFormat};

pub struct SelectArgs {
    pub repo_id: i64,
    pub name: String,
    pub owner: String,
    pub url: String,
    pub branch: Option<String>,
    pub token: Option<String>,
}

/// Select a repository and wait for the workspace to be ready
pub async fn run(args: SelectArgs, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    let token = args
        .token
        .or_else(|| config.access_token.clone())
        .context(
            "No access token. Pass --token, or set it with:\n  \
             arcana config set access_token <token>",
        )?;

    let client = ArcanaClient::connect(config.client_config());

    let mut state_rx = client.subscribe_state();
    timeout(
        Duration::from_secs(10),
        state_rx.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .map_err(|_| anyhow!("Could not connect to {}", config.endpoint_url))??;

    let repo_data = RepoData {
        repo_id: args.repo_id,
        name: args.name,
        owner: args.owner,
        url: args.url,
        branch: args.branch,
    };
    output.message(&format!(
        "Selecting {}/{}...",
        repo_data.owner, repo_data.name
    ));

    // stream session changes alongside the request itself
    let mut sync_rx = client.subscribe_sync();
    let progress = async {
        loop {
            if sync_rx.changed().await.is_err() {
                break;
            }
            let snap = sync_rx.borrow().clone();
            output.sync_progress(&snap);
            if matches!(
                snap.status,
                SyncStatus::Synchronized | SyncStatus::Error | SyncStatus::Idle
            ) {
                break;
            }
        }
    };

    let (result, ()) = tokio::join!(client.select_github_repo(repo_data, &token), progress);
    client.shutdown();

    let selection = result?;
    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "workspaceId": selection.workspace_id })
            );
        }
        OutputFormat::Quiet => println!("{}", selection.workspace_id),
        OutputFormat::Human => {
            output.success(&format!("Workspace ready: {}", selection.workspace_id));
        }
    }

    Ok(())
}
