//! Interactive session
//!
//! Keeps the vault unlocked and reads commands from stdin. A ticker task
//! drives the inactivity timeout and every line of input resets it. The
//! lifecycle stays on the main thread; the runtime is only entered to wait
//! for the next tick or line.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use linkvault_core::session::{spawn_ticker, SessionHost, TickerHandle};
use linkvault_core::{Config, EventSink, SessionEvent, SessionLifecycle};

use crate::commands::link::{self, FilterArgs, NewLink};
use crate::commands::{close, new_lifecycle, tag};
use crate::output::Output;
use crate::prompt::PASSWORD_ENV;

const HELP: &str = "\
Commands:
  list [text]          list links (saved filters, or matching text)
  show <url>           show a link
  add <url> [tag...]   add a link
  remove <url>         remove a link
  open <url>           open a link
  tags | sites         list tags or sites
  save                 write pending changes
  status               time left before the vault locks
  lock | unlock        lock or unlock the vault
  help | quit";

/// One line of session input
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionCommand {
    Empty,
    Help,
    List(Option<String>),
    Show(String),
    Add { url: String, tags: Vec<String> },
    Remove(String),
    Open(String),
    Tags,
    Sites,
    Save,
    Status,
    Lock,
    Unlock,
    Quit,
    Unknown(String),
}

impl SessionCommand {
    fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Self::Empty;
        };
        let rest: Vec<String> = words.map(str::to_string).collect();
        let single = |make: fn(String) -> Self| match rest.as_slice() {
            [arg] => make(arg.clone()),
            _ => Self::Unknown(line.trim().to_string()),
        };

        match command.to_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "list" | "ls" => Self::List((!rest.is_empty()).then(|| rest.join(" "))),
            "show" => single(Self::Show),
            "remove" | "rm" => single(Self::Remove),
            "open" => single(Self::Open),
            "add" => match rest.split_first() {
                Some((url, tags)) => Self::Add {
                    url: url.clone(),
                    tags: tags.to_vec(),
                },
                None => Self::Unknown(line.trim().to_string()),
            },
            "tags" => Self::Tags,
            "sites" => Self::Sites,
            "save" => Self::Save,
            "status" => Self::Status,
            "lock" => Self::Lock,
            "unlock" => Self::Unlock,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(line.trim().to_string()),
        }
    }
}

/// What the loop does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    AskPassword,
    Quit,
}

/// Stops the loop when a timed-out session asks the application to quit
struct CliHost {
    quit: Arc<AtomicBool>,
}

impl SessionHost for CliHost {
    fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }
}

enum Input {
    Tick,
    Line(String),
    Closed,
}

async fn next_input(ticker: &mut TickerHandle, lines: &mut Lines<BufReader<Stdin>>) -> Input {
    tokio::select! {
        tick = ticker.tick_rx.recv() => match tick {
            Some(_) => Input::Tick,
            None => Input::Closed,
        },
        line = lines.next_line() => match line {
            Ok(Some(line)) => Input::Line(line),
            Ok(None) | Err(_) => Input::Closed,
        },
    }
}

/// Run the interactive session until quit, end of input or a timeout quit
pub fn run(config: &Config, vault: &Path, output: &Output) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let quit = Arc::new(AtomicBool::new(false));
    let (events, mut event_rx) = EventSink::channel();

    let mut lifecycle = new_lifecycle(config)?
        .with_events(events)
        .with_host(Box::new(CliHost { quit: quit.clone() }));
    super::unlock(&mut lifecycle, vault)?;

    let (mut ticker, mut lines) = {
        let _guard = runtime.enter();
        (
            spawn_ticker(Duration::from_millis(config.tick_millis)),
            BufReader::new(tokio::io::stdin()).lines(),
        )
    };

    let fetch_timeout = Duration::from_secs(config.fetch_timeout_secs);
    let mut awaiting_password = false;
    output.message("Type `help` for commands.");
    drain_events(&mut event_rx, output);
    print_prompt(&lifecycle, awaiting_password);

    loop {
        let mut prompt_needed = false;
        match runtime.block_on(next_input(&mut ticker, &mut lines)) {
            Input::Tick => {
                lifecycle.tick();
            }
            Input::Closed => break,
            Input::Line(line) if awaiting_password => {
                awaiting_password = false;
                prompt_needed = true;
                if let Err(e) = lifecycle.start_session(vault, &line) {
                    output.warning(&e.to_string());
                }
            }
            Input::Line(line) => {
                prompt_needed = true;
                lifecycle.reset_time();
                let command = SessionCommand::parse(&line);
                match execute(&mut lifecycle, vault, command, fetch_timeout, output) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::AskPassword) => awaiting_password = true,
                    Ok(Flow::Quit) => break,
                    Err(e) => eprintln!("error: {:#}", e),
                }
            }
        }

        let printed = drain_events(&mut event_rx, output);
        if quit.load(Ordering::SeqCst) {
            output.message("Session timed out, exiting.");
            break;
        }
        if prompt_needed || printed {
            print_prompt(&lifecycle, awaiting_password);
        }
    }

    runtime.block_on(ticker.shutdown());
    // A pending stdin read must not hold up the exit
    runtime.shutdown_background();

    close(&mut lifecycle)?;
    drain_events(&mut event_rx, output);
    Ok(())
}

fn execute(
    lifecycle: &mut SessionLifecycle,
    vault: &Path,
    command: SessionCommand,
    fetch_timeout: Duration,
    output: &Output,
) -> Result<Flow> {
    match command {
        SessionCommand::Empty => return Ok(Flow::Continue),
        SessionCommand::Help => {
            println!("{}", HELP);
            return Ok(Flow::Continue);
        }
        SessionCommand::Quit => return Ok(Flow::Quit),
        SessionCommand::Unknown(line) => {
            output.warning(&format!("unknown command: {} (try `help`)", line));
            return Ok(Flow::Continue);
        }
        SessionCommand::Unlock => {
            if lifecycle.is_unlocked() {
                output.message("Already unlocked.");
                return Ok(Flow::Continue);
            }
            if let Ok(password) = std::env::var(PASSWORD_ENV) {
                lifecycle.start_session(vault, &password)?;
                return Ok(Flow::Continue);
            }
            return Ok(Flow::AskPassword);
        }
        SessionCommand::Lock => {
            close(lifecycle)?;
            return Ok(Flow::Continue);
        }
        SessionCommand::Status => {
            match lifecycle.remaining() {
                Some(remaining) => {
                    let store = lifecycle.store()?;
                    output.message(&format!(
                        "{} link(s), {}, locks in {}s",
                        store.links().len(),
                        if store.is_dirty() { "unsaved changes" } else { "saved" },
                        remaining.as_secs()
                    ));
                }
                None => output.message("Locked."),
            }
            return Ok(Flow::Continue);
        }
        _ => {}
    }

    let store = lifecycle.store_mut()?;
    match command {
        SessionCommand::List(text) => {
            let args = FilterArgs {
                text,
                ..FilterArgs::default()
            };
            link::list(store, &args, output)?;
        }
        SessionCommand::Show(url) => link::show(store, &url, output)?,
        SessionCommand::Add { url, tags } => {
            let new_link = NewLink {
                url,
                tags,
                ..NewLink::default()
            };
            link::add(store, new_link, fetch_timeout, output)?;
        }
        SessionCommand::Remove(url) => {
            let removed = store.remove_link(&url)?;
            output.success(&format!("Removed link: {}", removed.url));
        }
        SessionCommand::Open(url) => link::open(store, &url, output)?,
        SessionCommand::Tags => tag::list(store, output)?,
        SessionCommand::Sites => tag::sites(store, output)?,
        SessionCommand::Save => {
            if !store.save() {
                anyhow::bail!("Failed to save {}", store.path().display());
            }
            output.success("Saved");
        }
        _ => {}
    }
    Ok(Flow::Continue)
}

/// Report queued session events; true when something was printed
fn drain_events(event_rx: &mut UnboundedReceiver<SessionEvent>, output: &Output) -> bool {
    let mut printed = false;
    while let Ok(event) = event_rx.try_recv() {
        debug!(?event, "Session event");
        match event {
            SessionEvent::SessionStarted => {
                output.message("Vault unlocked.");
                printed = true;
            }
            SessionEvent::SessionStopped { .. } => {
                output.message("Vault locked. Type `unlock` to continue or `quit` to exit.");
                printed = true;
            }
            SessionEvent::SettingsUpdated(_) => {
                output.message("Settings updated.");
                printed = true;
            }
            _ => {}
        }
    }
    printed
}

fn print_prompt(lifecycle: &SessionLifecycle, awaiting_password: bool) {
    use std::io::Write;

    if awaiting_password {
        print!("Password: ");
    } else if lifecycle.is_unlocked() {
        print!("> ");
    } else {
        print!("locked> ");
    }
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use linkvault_core::session::ManualClock;
    use linkvault_core::{FetchError, ImageFetcher, Link, SessionState, Settings};
    use tempfile::TempDir;

    struct Offline;

    impl ImageFetcher for Offline {
        fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
            Err(FetchError::Other {
                url: url.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(SessionCommand::parse("   "), SessionCommand::Empty);
        assert_eq!(SessionCommand::parse("ls"), SessionCommand::List(None));
        assert_eq!(
            SessionCommand::parse("list rust  book"),
            SessionCommand::List(Some("rust book".to_string()))
        );
        assert_eq!(
            SessionCommand::parse("add https://example.com rust cli"),
            SessionCommand::Add {
                url: "https://example.com".to_string(),
                tags: vec!["rust".to_string(), "cli".to_string()],
            }
        );
        assert_eq!(
            SessionCommand::parse("OPEN https://example.com"),
            SessionCommand::Open("https://example.com".to_string())
        );
        assert_eq!(SessionCommand::parse("exit"), SessionCommand::Quit);
    }

    #[test]
    fn test_parse_rejects_missing_or_extra_arguments() {
        assert!(matches!(SessionCommand::parse("show"), SessionCommand::Unknown(_)));
        assert!(matches!(SessionCommand::parse("rm a b"), SessionCommand::Unknown(_)));
        assert!(matches!(SessionCommand::parse("add"), SessionCommand::Unknown(_)));
        assert!(matches!(SessionCommand::parse("frobnicate"), SessionCommand::Unknown(_)));
    }

    #[test]
    fn test_execute_against_unlocked_vault() {
        let dir = TempDir::new().unwrap();
        let vault = dir.path().join("links.linkvault");
        SessionLifecycle::create_vault(&vault, "password", Settings::default()).unwrap();

        let mut lifecycle =
            SessionLifecycle::new(Arc::new(ManualClock::default()), Arc::new(Offline));
        lifecycle.start_session(&vault, "password").unwrap();
        lifecycle
            .store_mut()
            .unwrap()
            .add_link(Link::new("https://example.com"))
            .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        let timeout = Duration::from_secs(1);
        let exec = |lifecycle: &mut SessionLifecycle, line: &str| {
            execute(lifecycle, &vault, SessionCommand::parse(line), timeout, &output).unwrap()
        };

        assert_eq!(exec(&mut lifecycle, "list"), Flow::Continue);
        assert_eq!(exec(&mut lifecycle, "save"), Flow::Continue);
        assert!(!lifecycle.store().unwrap().is_dirty());

        assert_eq!(exec(&mut lifecycle, "rm https://example.com"), Flow::Continue);
        assert_eq!(exec(&mut lifecycle, "lock"), Flow::Continue);
        assert_eq!(lifecycle.state(), SessionState::Locked);

        // Locking saved the removal
        std::env::remove_var(PASSWORD_ENV);
        assert_eq!(exec(&mut lifecycle, "unlock"), Flow::AskPassword);
        lifecycle.start_session(&vault, "password").unwrap();
        assert!(lifecycle.store().unwrap().links().is_empty());

        assert_eq!(exec(&mut lifecycle, "quit"), Flow::Quit);
    }

    #[test]
    fn test_host_requests_quit() {
        let quit = Arc::new(AtomicBool::new(false));
        let host = CliHost { quit: quit.clone() };
        host.request_quit();
        assert!(quit.load(Ordering::SeqCst));
    }
}
