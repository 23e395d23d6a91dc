//! Interactive prompts
//!
//! Confirmation, prompts with defaults and password entry.

use anyhow::{bail, Result};
use std::env;
use std::io::{self, BufRead, Write};

/// Password used instead of prompting (for scripts)
pub const PASSWORD_ENV: &str = "LINKVAULT_PASSWORD";

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let input = read_line()?;
    Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}

/// Prompt with a default value, returns None if user keeps default
pub fn prompt_with_default(prompt: &str, default: &str) -> Result<Option<String>> {
    if default.is_empty() {
        print!("{}: ", prompt);
    } else {
        print!("{} [{}]: ", prompt, default);
    }
    io::stdout().flush()?;

    let input = read_line()?;
    let input = input.trim();

    if input.is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.to_string()))
    }
}

/// Read the vault password
///
/// Taken from `LINKVAULT_PASSWORD` when set, otherwise read from stdin.
pub fn read_password(prompt: &str) -> Result<String> {
    if let Ok(password) = env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    ask_password(prompt)
}

/// Read a new password, asking twice when prompting
pub fn read_new_password(prompt: &str) -> Result<String> {
    if let Ok(password) = env::var(format!("{}_NEW", PASSWORD_ENV)) {
        return Ok(password);
    }

    let first = ask_password(prompt)?;
    let second = ask_password("Repeat password")?;
    if first != second {
        bail!("Passwords do not match");
    }
    Ok(first)
}

fn ask_password(prompt: &str) -> Result<String> {
    // Input is echoed; use LINKVAULT_PASSWORD to keep it off the terminal
    print!("{}: ", prompt);
    io::stdout().flush()?;
    Ok(read_line()?.trim_end_matches(['\r', '\n']).to_string())
}

fn read_line() -> Result<String> {
    let mut input = String::new();
    if io::stdin().lock().read_line(&mut input)? == 0 {
        bail!("No input (stdin closed)");
    }
    Ok(input)
}
