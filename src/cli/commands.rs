use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader, Lines};

use crate::app::ConfigurationStore;
use crate::backends::BackendFactory;
use crate::capture::extract_text;
use crate::session::{AnalysisSession, ProviderSelector, SessionEvent};
use crate::utils::{log_status, AnalyzerError};

use super::args::{AnalyzeArgs, Commands, ConfigAction, SetArgs};

/// A turn failure already printed from its `TurnFailed` event
#[derive(Debug, thiserror::Error)]
#[error("analysis turn failed: {0}")]
struct ShownTurnFailure(#[source] AnalyzerError);

/// Whether `error` was already shown to the user as it happened
pub fn already_reported(error: &anyhow::Error) -> bool {
    error.downcast_ref::<ShownTurnFailure>().is_some()
}

/// Handle CLI subcommands
pub async fn handle_command(command: &Commands, store: Arc<ConfigurationStore>) -> Result<()> {
    match command {
        Commands::Analyze(args) => analyze(args, store).await,
        Commands::Models => list_models(&store).await,
        Commands::Config { action } => configure(action, &store),
    }
}

async fn analyze(args: &AnalyzeArgs, store: Arc<ConfigurationStore>) -> Result<()> {
    let reads_stdin = args.file.is_none() && args.dir.is_none();
    if reads_stdin && args.chat {
        bail!("--chat needs the log from FILE or --dir, stdin is used for the log itself");
    }

    let log_text = read_log(args).await?;
    if log_text.trim().is_empty() {
        bail!("No log text to analyze");
    }

    let mut selector = ProviderSelector::new(store, BackendFactory::new()?)?;
    announce(selector.current());

    let session = selector.current();
    run_turn(session, Turn::Initial(&log_text)).await?;

    if args.chat {
        chat_loop(&mut selector).await?;
    }
    Ok(())
}

async fn read_log(args: &AnalyzeArgs) -> Result<String> {
    if let Some(file) = &args.file {
        return tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read log file {}", file.display()));
    }
    if let Some(dir) = &args.dir {
        return Ok(extract_text(dir, &args.patterns).await);
    }

    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read log from stdin")?;
    Ok(text)
}

fn announce(session: &AnalysisSession) {
    log_status(
        format!(
            "Analyzing with {} ({})",
            session.backend_kind(),
            session.model_name()
        )
        .cyan(),
    );
}

enum Turn<'a> {
    Initial(&'a str),
    Additional(&'a str),
}

/// Run one turn, printing fragments as they arrive. Ctrl-C cancels the turn.
async fn run_turn(session: &mut AnalysisSession, turn: Turn<'_>) -> Result<String> {
    let mut events = session.subscribe();
    let cancel = session.cancellation_token();
    let mut failure_shown = false;

    let send = async {
        match turn {
            Turn::Initial(text) => session.send_initial(text).await,
            Turn::Additional(text) => session.send_additional(text).await,
        }
    };
    tokio::pin!(send);

    loop {
        tokio::select! {
            result = &mut send => {
                while let Ok(event) = events.try_recv() {
                    failure_shown |= print_event(event);
                }
                return result.map_err(|e| {
                    if failure_shown {
                        anyhow::Error::new(ShownTurnFailure(e))
                    } else {
                        anyhow::Error::new(e)
                    }
                });
            }
            Some(event) = events.recv() => failure_shown |= print_event(event),
            signal = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                if signal.is_ok() {
                    cancel.cancel();
                }
            }
        }
    }
}

/// Print one session event, returning true if it reported a failure
fn print_event(event: SessionEvent) -> bool {
    match event {
        SessionEvent::Fragment(fragment) => {
            print!("{fragment}");
            std::io::stdout().flush().ok();
            false
        }
        SessionEvent::TurnCompleted => {
            println!();
            false
        }
        SessionEvent::TurnFailed(error) => {
            println!();
            log_status(format!("Error: {error}").red());
            true
        }
    }
}

/// Next chat line, or `None` at end of input or once `interrupt` resolves
async fn next_prompt<R>(
    lines: &mut Lines<R>,
    interrupt: impl Future<Output = ()>,
) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        line = lines.next_line() => Ok(line?),
        () = interrupt => Ok(None),
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No handler could be installed; never interrupt
        std::future::pending::<()>().await;
    }
}

async fn chat_loop(selector: &mut ProviderSelector) -> Result<()> {
    let hint = "Ask a follow-up question. /refresh reloads the provider, /quit exits.";
    log_status(hint.dimmed());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        eprint!("{} ", ">".green().bold());
        std::io::stderr().flush().ok();

        let Some(line) = next_prompt(&mut lines, ctrl_c()).await? else {
            eprintln!();
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/refresh" => match selector.refresh() {
                Ok(()) => announce(selector.current()),
                Err(e) => log_status(format!("Refresh failed: {e}").red()),
            },
            message => {
                // Failures were already shown; the chat goes on
                run_turn(selector.current(), Turn::Additional(message))
                    .await
                    .ok();
            }
        }
    }
    Ok(())
}

/// List models offered by the configured provider
pub async fn list_models(store: &ConfigurationStore) -> Result<()> {
    let settings = store.load(false)?;
    let backend = BackendFactory::new()?.create(&settings)?;
    let models = backend.list_models().await?;

    println!("Available {} models:", backend.kind());
    for model in models {
        if model == backend.model_name() {
            println!("  • {} {}", model.green().bold(), "(current)".dimmed());
        } else {
            println!("  • {}", model.green());
        }
    }
    Ok(())
}

fn configure(action: &ConfigAction, store: &ConfigurationStore) -> Result<()> {
    let options = store.options();
    match action {
        ConfigAction::Init { force } => {
            if store.initialize(*force)? {
                println!("Configuration written to {}", options.base_path().display());
            } else {
                println!(
                    "Configuration already exists at {} (use --force to replace it)",
                    options.base_path().display()
                );
            }
        }
        ConfigAction::Show => {
            let settings = store.load(false)?;
            println!("{} {}", "Environment:".bold(), options.environment);
            println!("{} {}", "Base file:".bold(), options.base_path().display());
            println!(
                "{} {}",
                "Override file:".bold(),
                options.override_path().display()
            );
            println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
        }
        ConfigAction::Set(args) => update_settings(args, store)?,
    }
    Ok(())
}

fn update_settings(args: &SetArgs, store: &ConfigurationStore) -> Result<()> {
    let mut settings = (*store.load(false)?).clone();
    if !args.apply(&mut settings) {
        bail!("Nothing to change, pass at least one setting flag");
    }

    store.save(&settings)?;
    println!(
        "Settings saved to {}",
        store.options().override_path().display()
    );
    Ok(())
}
