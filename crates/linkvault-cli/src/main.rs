//! linkvault CLI
//!
//! Command-line interface for linkvault - an encrypted, auto-locking
//! bookmark vault.

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use linkvault_core::Config;

mod commands;
mod metadata;
mod output;
mod prompt;

use commands::link::{FilterArgs, NewLink};
use commands::vault::ImportSkips;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "linkvault")]
#[command(about = "linkvault - an encrypted, auto-locking bookmark vault")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Vault file name (in the data directory) or path
    #[arg(long, global = true)]
    vault: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (default)
    Session,
    /// Create a new vault
    Create {
        /// Lock after this many seconds without activity
        #[arg(long)]
        lock_after: Option<u64>,
    },
    /// Manage links
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },
    /// List all tags
    Tags,
    /// List the sites links point at
    Sites,
    /// List the ratings in use
    Ratings,
    /// Merge an exported vault document into this vault
    Import {
        /// Exported JSON document
        path: PathBuf,
        /// Keep the current links
        #[arg(long)]
        skip_links: bool,
        /// Keep the current filters
        #[arg(long)]
        skip_filters: bool,
        /// Keep the current settings
        #[arg(long)]
        skip_settings: bool,
    },
    /// Export vault contents (unencrypted)
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Change the vault password
    Passwd,
    /// Show or set per-vault settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum LinkCommands {
    /// Add a new link
    #[command(alias = "create")]
    Add {
        /// URL to save
        url: String,
        /// Tags to add
        #[arg(short, long)]
        tag: Vec<String>,
        /// Title (loaded from the page when omitted)
        #[arg(long)]
        title: Option<String>,
        /// Rating from 1 to 5
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: Option<u8>,
        /// Thumbnail image URL (picked from the page when omitted)
        #[arg(long)]
        thumbnail: Option<String>,
        /// Do not load the page
        #[arg(long)]
        offline: bool,
    },
    /// List links
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Show link details
    Show {
        /// Link URL
        url: String,
    },
    /// Edit a link
    Edit {
        /// Link URL
        url: String,
    },
    /// Remove a link
    #[command(alias = "rm")]
    Remove {
        /// Link URL
        url: String,
    },
    /// Open a link with the configured program
    Open {
        /// Link URL
        url: String,
    },
}

#[derive(Subcommand)]
enum ExportCommands {
    /// The whole vault document as JSON
    Document {
        /// Target file (must not exist)
        path: PathBuf,
    },
    /// URLs passing the saved filters, one per line
    Links {
        /// Target file (must not exist)
        path: PathBuf,
    },
}

#[derive(Subcommand, Clone)]
enum SettingsCommands {
    /// Show vault settings
    Show,
    /// Set a vault setting
    Set {
        /// Setting name (lock_after_seconds, open_link_command, ...)
        key: String,
        /// New value
        value: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, default_vault, log_file, fetch_timeout_secs, tick_millis)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let result = run(cli, &output);
    if let Err(e) = &result {
        if let Some(hint) = commands::recovery_hint(e) {
            output.warning(hint);
        }
    }
    result
}

fn run(cli: Cli, output: &Output) -> Result<()> {
    // Config commands don't need a vault
    if let Some(Commands::Config { command }) = &cli.command {
        return handle_config_command(command.clone(), output);
    }

    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config);

    let vault = config.vault_path(cli.vault.as_deref());
    let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);

    match cli.command.unwrap_or(Commands::Session) {
        Commands::Session => commands::session::run(&config, &vault, output),
        Commands::Create { lock_after } => commands::vault::create(&vault, lock_after, output),
        Commands::Link { command } => commands::with_session(&config, &vault, |lifecycle| {
            handle_link_command(command, lifecycle.store_mut()?, fetch_timeout, output)
        }),
        Commands::Tags => commands::with_session(&config, &vault, |lifecycle| {
            commands::tag::list(lifecycle.store()?, output)
        }),
        Commands::Sites => commands::with_session(&config, &vault, |lifecycle| {
            commands::tag::sites(lifecycle.store()?, output)
        }),
        Commands::Ratings => commands::with_session(&config, &vault, |lifecycle| {
            commands::tag::ratings(lifecycle.store()?, output)
        }),
        Commands::Import {
            path,
            skip_links,
            skip_filters,
            skip_settings,
        } => {
            let skips = ImportSkips {
                links: skip_links,
                filters: skip_filters,
                settings: skip_settings,
            };
            commands::with_session(&config, &vault, |lifecycle| {
                commands::vault::import(lifecycle.store_mut()?, &path, skips, output)
            })
        }
        Commands::Export { command } => commands::with_session(&config, &vault, |lifecycle| {
            let store = lifecycle.store()?;
            match command {
                ExportCommands::Document { path } => {
                    commands::vault::export_document(store, &path, output)
                }
                ExportCommands::Links { path } => commands::link::export(store, &path, output),
            }
        }),
        Commands::Passwd => commands::with_session(&config, &vault, |lifecycle| {
            commands::vault::change_password(lifecycle, output)
        }),
        Commands::Settings { command } => commands::with_session(&config, &vault, |lifecycle| {
            let store = lifecycle.store_mut()?;
            match command {
                Some(SettingsCommands::Show) | None => commands::settings::show(store, output),
                Some(SettingsCommands::Set { key, value }) => {
                    commands::settings::set(store, &key, &value, output)
                }
            }
        }),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_link_command(
    command: LinkCommands,
    store: &mut linkvault_core::SessionStore,
    fetch_timeout: Duration,
    output: &Output,
) -> Result<()> {
    match command {
        LinkCommands::Add {
            url,
            tag,
            title,
            rating,
            thumbnail,
            offline,
        } => {
            let new_link = NewLink {
                url,
                tags: tag,
                title,
                rating,
                thumbnail,
                offline,
            };
            commands::link::add(store, new_link, fetch_timeout, output)
        }
        LinkCommands::List { filters } => commands::link::list(store, &filters, output),
        LinkCommands::Show { url } => commands::link::show(store, &url, output),
        LinkCommands::Edit { url } => commands::link::edit(store, &url, output),
        LinkCommands::Remove { url } => commands::link::remove(store, &url, output),
        LinkCommands::Open { url } => commands::link::open(store, &url, output),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Initialize file logging
///
/// Only initializes if LINKVAULT_LOG environment variable is set.
/// Logs to file (config.log_file or default {data_dir}/debug.log).
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("LINKVAULT_LOG") else {
        return;
    };

    let log_path = config.log_path();
    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "linkvault_core={},linkvault_cli={}",
        log_level, log_level
    ));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}
