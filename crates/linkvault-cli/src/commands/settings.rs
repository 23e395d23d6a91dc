//! Vault settings handlers
//!
//! Settings live inside the encrypted vault, unlike `config`.

use anyhow::{bail, Context, Result};

use linkvault_core::{SessionStore, Settings};

use crate::commands::link::split_list;
use crate::output::Output;

const KEYS: &str = "open_link_command, open_link_arguments, default_tag, lock_after_seconds, \
                    thumbnail_image_ids, clear_clipboard_when_session_stops, \
                    quit_when_session_timeouts, link_files_directory_path";

/// Show the vault settings
pub fn show(store: &SessionStore, output: &Output) -> Result<()> {
    output.print_settings(store.settings());
    Ok(())
}

/// Change one vault setting
pub fn set(store: &mut SessionStore, key: &str, value: &str, output: &Output) -> Result<()> {
    let mut settings = store.settings().clone();
    apply(&mut settings, key, value)?;
    store
        .save_settings(settings)
        .context("Failed to update settings")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

/// Parse `value` into the setting named `key`
fn apply(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    match key {
        "open_link_command" => settings.open_link_command = value.to_string(),
        "open_link_arguments" => settings.open_link_arguments = value.to_string(),
        "default_tag" => settings.default_tag = value.trim().to_string(),
        "lock_after_seconds" => {
            settings.lock_after_seconds = value
                .parse()
                .context("Invalid value for lock_after_seconds. Use a number of seconds.")?;
        }
        "thumbnail_image_ids" => settings.thumbnail_image_ids = split_list(value),
        "clear_clipboard_when_session_stops" => {
            settings.clear_clipboard_when_session_stops = parse_bool(key, value)?;
        }
        "quit_when_session_timeouts" => {
            settings.quit_when_session_timeouts = parse_bool(key, value)?;
        }
        "link_files_directory_path" => {
            settings.link_files_directory_path = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => bail!("Unknown setting: '{}'\nValid keys: {}", key, KEYS),
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse()
        .with_context(|| format!("Invalid value for {}. Use 'true' or 'false'.", key))
}
