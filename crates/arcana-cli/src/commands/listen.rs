//! Listen command handler
//!
//! Subscribes to one message type and prints each inbound frame.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;

use arcana_core::{ArcanaClient, Config, ConnectionState};

use crate::output::{Output, OutputFormat};

/// Print frames of the given type until Ctrl-C or `count` frames
pub async fn run(
    message_type: &str,
    count: Option<usize>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    let client = ArcanaClient::connect(config.client_config());

    let mut state_rx = client.subscribe_state();
    timeout(
        Duration::from_secs(10),
        state_rx.wait_for(|s| *s == ConnectionState::Connected),
    )
    .await
    .map_err(|_| anyhow!("Could not connect to {}", config.endpoint_url))??;

    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<Value>();
    let _sub = client.add_message_listener(message_type, move |frame| {
        let _ = frame_tx.send(frame.clone());
    });

    output.message(&format!(
        "Listening for '{}' frames (Ctrl-C to stop)...",
        message_type
    ));

    let mut received = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            frame = frame_rx.recv() => {
                let Some(frame) = frame else { break };
                match output.format {
                    OutputFormat::Human => println!("{}", serde_json::to_string_pretty(&frame)?),
                    OutputFormat::Json | OutputFormat::Quiet => println!("{}", frame),
                }
                received += 1;
                if count.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
        }
    }

    client.shutdown();
    Ok(())
}
