//! Status command handler

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::timeout;

use arcana_core::{ArcanaClient, Config, ConnectionState};

use crate::output::{Output, OutputFormat};

/// Show connection and sync status
pub async fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let client = ArcanaClient::connect(config.client_config());

    let mut state_rx = client.subscribe_state();
    let connected = matches!(
        timeout(
            Duration::from_secs(5),
            state_rx.wait_for(|s| *s == ConnectionState::Connected),
        )
        .await,
        Ok(Ok(_))
    );

    let state = client.connection_state();
    let sync = client.sync_state();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "endpoint": config.endpoint_url,
                    "client_id": client.client_id(),
                    "connection": state,
                    "sync": sync,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", state_label(state));
        }
        OutputFormat::Human => {
            println!("Arcana Status");
            println!("=============");
            println!();
            println!("Endpoint:   {}", config.endpoint_url);
            println!("Client ID:  {}", client.client_id());
            println!("Connection: {}", state_label(state));
            if !connected {
                println!();
                println!("Could not reach the backend. Check the endpoint URL with:");
                println!("  arcana config show");
            }
        }
    }

    client.shutdown();
    Ok(())
}

fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
        ConnectionState::Disconnected => "disconnected",
    }
}
