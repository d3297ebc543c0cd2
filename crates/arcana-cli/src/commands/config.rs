//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use arcana_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "endpoint_url": config.endpoint_url,
                    "access_token_set": config.access_token.is_some(),
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.endpoint_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  endpoint_url: {}", config.endpoint_url);
            println!(
                "  access_token: {}",
                if config.access_token.is_some() {
                    "(set)"
                } else {
                    "(not set)"
                }
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    // edit the file as written; env overrides must not end up saved
    let mut config = Config::load_file(&save_path).context("Failed to load configuration")?;

    match key.as_str() {
        "endpoint_url" => {
            config.endpoint_url = value.clone();
        }
        "access_token" => {
            config.access_token = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.clone())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: endpoint_url, access_token",
                key
            );
        }
    }

    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    // never echo token values back
    if key == "access_token" {
        output.success(&format!("Set {}", key));
    } else {
        output.success(&format!("Set {} = {}", key, value));
    }

    Ok(())
}
