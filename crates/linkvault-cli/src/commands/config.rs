//! Config command handlers

use anyhow::{bail, Context, Result};

use linkvault_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "default_vault": config.default_vault,
                    "log_file": config.log_file,
                    "fetch_timeout_secs": config.fetch_timeout_secs,
                    "tick_millis": config.tick_millis,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.vault_path(None).display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:           {}", config.data_dir.display());
            println!("  default_vault:      {}", config.default_vault);
            println!(
                "  log_file:           {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  fetch_timeout_secs: {}", config.fetch_timeout_secs);
            println!("  tick_millis:        {}", config.tick_millis);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;
    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "default_vault" => {
            if value.is_empty() {
                bail!("default_vault cannot be empty");
            }
            config.default_vault = value.to_string();
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        "fetch_timeout_secs" => {
            config.fetch_timeout_secs = value
                .parse()
                .context("Invalid value for fetch_timeout_secs. Use a number of seconds.")?;
        }
        "tick_millis" => {
            let millis: u64 = value
                .parse()
                .context("Invalid value for tick_millis. Use a number of milliseconds.")?;
            if millis == 0 {
                bail!("tick_millis must be greater than zero");
            }
            config.tick_millis = millis;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, default_vault, log_file, fetch_timeout_secs, tick_millis",
                key
            );
        }
    }
    Ok(())
}
